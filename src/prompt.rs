//! Interactive choices.

use inquire::{InquireError, Select};

use crate::error::{Error, Result};

/// Ask the user to pick one of `options`, returning its index.
pub trait PromptChoice {
    fn choose(&self, message: &str, options: &[String]) -> Result<usize>;
}

/// Yes/no question on top of [`PromptChoice`]. "No" is listed first.
pub fn confirm(prompt: &dyn PromptChoice, question: &str) -> Result<bool> {
    let options = ["No".to_string(), "Yes".to_string()];
    Ok(prompt.choose(question, &options)? == 1)
}

/// Terminal prompt backed by `inquire`.
#[derive(Debug, Default)]
pub struct InquirePrompt;

impl PromptChoice for InquirePrompt {
    fn choose(&self, message: &str, options: &[String]) -> Result<usize> {
        let selection = Select::new(message, options.to_vec())
            .with_starting_cursor(0)
            .with_page_size(10)
            .with_help_message("↑↓ to move, ENTER to select, ESC to cancel")
            .raw_prompt()
            .map_err(|e| match e {
                InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                    Error::Cancelled
                }
                other => Error::Prompt(other.to_string()),
            })?;
        Ok(selection.index)
    }
}
