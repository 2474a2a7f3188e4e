//! Approval CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the approval controller.

pub mod approval;
pub mod conditions;
pub mod references;

pub use approval::*;
pub use conditions::*;
pub use references::*;
