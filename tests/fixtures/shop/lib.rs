//! Shop service messaging surface

pub mod billing;
pub mod catalog;
pub mod orders;
pub mod shipping;

#[server(
    "production",
    url = "kafka.shop.example.com:9092",
    protocol = "kafka",
    protocol_version = "3.5",
    description = "Production cluster"
)]
pub struct Broker;
