pub mod profile;
pub mod resolver;

pub use profile::{
    CapabilityEntry, DiscoveryProfile, InventoryEntry, ProfileEnvelope, RestBinding, ServiceEntry,
};
pub use resolver::{ResolverConfig, SupplierDiscoveryResolver, SupplierQuote};
