/// A shipped parcel item
pub struct Item {
    pub sku: String,
    pub weight_grams: u32,
}

pub struct Handlers;

impl Handlers {
    /// Called for every item leaving the warehouse
    #[subscribe("shipping.items", operation_id = "onItemShipped")]
    pub fn on_item_shipped(&self, item: Item) {
        let _ = item;
    }
}
