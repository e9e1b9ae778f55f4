mod editor;
mod fixtures;
mod server;

pub use editor::TestEditor;
pub use fixtures::{job_titles, machine_titles, workshop_form};
pub use server::TestServer;
