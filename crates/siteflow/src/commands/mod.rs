pub mod deploy;
pub mod invalidate;
pub mod pipeline;
pub mod plan;
pub mod rewrite;
pub mod stages;
pub mod status;
pub mod synth;
