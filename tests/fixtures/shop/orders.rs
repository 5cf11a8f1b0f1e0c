use serde::{Deserialize, Serialize};

/// Emitted when a customer places an order
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub id: String,
    pub total: f64,
    pub customer_note: Option<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "paid")]
    Paid,
    Shipped,
    #[serde(skip)]
    Internal,
}

/// Emitted when an order is cancelled
#[derive(Debug, Serialize, Deserialize)]
#[message(name = "orderCancelled", title = "Order cancelled", content_type = "application/json")]
pub struct OrderCancelled {
    pub id: String,
    #[serde(rename = "why")]
    pub reason: Option<String>,
    #[serde(skip)]
    pub audit_trail: Vec<String>,
}

/// Order lifecycle events
#[channel("orders", servers("production"))]
#[publish(operation_id = "placeOrder", message = OrderPlaced, tags("orders"))]
#[subscribe(operation_id = "onOrderCancelled", message = OrderCancelled)]
pub struct OrderService;
