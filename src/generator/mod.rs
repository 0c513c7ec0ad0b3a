//! Document generation: template values, content trees, page rendering and
//! HTML to PDF conversion.

pub mod content;
pub mod data;
pub mod engine;
pub mod format;
pub mod i18n;
pub mod mustache;
pub mod pipeline;
pub mod renderer;
pub mod values;

pub use content::{render_html, resolve_contents};
pub use data::{DocumentParams, ProviderRegistry};
pub use engine::{ChromeHeadless, PdfConverter};
pub use i18n::Catalog;
pub use pipeline::RenderPipeline;
pub use renderer::{Renderer, TeraRenderer};
pub use values::resolve_template_values;
