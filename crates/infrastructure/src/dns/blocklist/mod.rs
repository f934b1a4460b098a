pub mod cidr_db;
pub mod domain_db;
pub mod hosts_db;
pub mod loader;
pub mod multi_db;
pub mod multi_ip_db;
pub mod regexp_db;
pub mod suffix_trie;
pub mod swap;

pub use cidr_db::CidrDb;
pub use domain_db::DomainDb;
pub use hosts_db::HostsDb;
pub use loader::{FileLoader, HttpLoader, StaticLoader};
pub use multi_db::MultiDb;
pub use multi_ip_db::MultiIpDb;
pub use regexp_db::RegexpDb;
pub use suffix_trie::SuffixTrie;
pub use swap::{SwappableDb, SwappableIpDb};
