mod access;
mod actor;
mod backend;
mod chunk;
mod deletion;
mod hash;
mod meta;
mod progress;
mod purpose;
mod session_id;
mod stored;

#[rustfmt::skip]
pub use {
    access::*,
    actor::*,
    backend::*,
    chunk::*,
    deletion::*,
    hash::*,
    meta::*,
    progress::*,
    purpose::*,
    session_id::*,
    stored::*,
};
