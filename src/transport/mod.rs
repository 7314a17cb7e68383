//! Transports beyond plain TCP: the in-process loopback pair.

mod loopback;

pub use loopback::{
    conn_pair, local_exec, local_get, local_put, local_service, LoopbackConn, LOOPBACK_ADDR,
};
