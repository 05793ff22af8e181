pub mod config;
pub mod fetch;
pub mod parser;
pub mod source;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
