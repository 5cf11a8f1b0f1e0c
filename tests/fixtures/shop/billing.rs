/// A billed line item
pub struct Item {
    pub sku: String,
    pub amount: f64,
}

#[publish("billing.invoices", operation_id = "invoiceItem", message = Item)]
pub struct Invoicing;
