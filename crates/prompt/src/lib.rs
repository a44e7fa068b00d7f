pub mod assemble;
pub mod types;

pub use assemble::assemble_prompt;
pub use types::{CharacterDescriptor, LocaleContext, PersonaFields};
