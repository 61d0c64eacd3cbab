mod descriptor;
mod set;

pub use descriptor::{ReadinessPolicy, ServiceDescriptor, PORT_ENV, PORT_PLACEHOLDER};
pub use set::{DescriptorError, DescriptorSet};
