/// A node in the product category tree
pub struct Category {
    pub name: String,
    pub children: Vec<Category>,
}

#[subscribe("catalog/{region}/categories", operation_id = "onCategoryTree")]
pub fn on_category_tree(root: Category) {
    let _ = root;
}
