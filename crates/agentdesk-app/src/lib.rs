// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod filter;
pub mod forms;
pub mod ids;
pub mod model;
pub mod options;
pub mod state;
pub mod submit;

pub use filter::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use options::*;
pub use state::*;
pub use submit::*;
