use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity a caller claims. Authentication happens outside the engine;
/// here the id is only matched against resource ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl User {
    pub fn new(id: Uuid) -> Self {
        Self { id, roles: vec![] }
    }

    fn has_role(&self, role: String) -> bool {
        self.roles.iter().find(|&x| x == &role).is_some()
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.clone())
            .add_attribute_getter("roles", |recv: &User| recv.roles.clone())
            .add_method("has_role", User::has_role)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}
