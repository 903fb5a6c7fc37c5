pub mod analyser;
pub mod biquad;
pub mod decode;
pub mod graph;
pub mod sink;
