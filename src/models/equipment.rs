use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of a trip's equipment list. Stored inline with its trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub assigned_user_id: Option<i64>,
    #[serde(default)]
    pub done: bool,
}

impl Equipment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            quantity: 1,
            assigned_user_id: None,
            done: false,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn assigned_to(mut self, user_id: i64) -> Self {
        self.assigned_user_id = Some(user_id);
        self
    }
}
