/*!
## Language Module

Lexical analysis for the Pascal-lite language: tokens and the
one-token-lookahead stream consumed by the compiler.

*/

mod error;
mod lex;
mod token;

pub use error::Error;
pub use lex::TokenStream;
pub use token::Token;

#[cfg(test)]
mod tests;
