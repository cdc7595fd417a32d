pub mod architecture;
pub mod domain;
pub mod impact;
pub mod pipeline;
pub mod report;
pub mod rules;

pub use architecture::*;
pub use domain::*;
pub use impact::*;
pub use pipeline::*;
pub use rules::*;
