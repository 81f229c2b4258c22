mod collective;
mod local;
mod solo;
mod star;

pub use collective::Collective;
pub use local::LocalGroup;
pub use solo::Solo;
pub use star::StarCollective;
