// Pipeline composition: the stages wired together, plus the joins that turn
// their outputs into exportable artifacts.

pub mod assemble;
pub mod run;
pub mod summary;
