// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! mywant-recipe: parameterized want-graph templates and their expansion
//! into concrete, owned wants.

pub mod custom_types;
pub mod loader;
pub mod recipe;
pub mod template;

pub use custom_types::{CustomTypeEntry, CustomTypeRegistry};
pub use loader::{expand, load_recipe_file, merge_params, RecipeError};
pub use recipe::{RecipeBody, RecipeFile, RecipeMetadata, WantTemplate};
