//! Utility macros for the engine.
//!
//! This module defines helper macros used throughout the crate:
//!
//! - `MK_TOKEN!` - Creates a Token instance
//! - `MK_TOKEN_KINDS!` - Declares the hierarchical TokenKind enum
//!
//! These macros reduce boilerplate in the lexer implementation.

/// Creates a Token instance.
///
/// # Arguments
///
/// * `$kind` - The TokenKind
/// * `$value` - The slice of the input covered by the token
/// * `$start` - Absolute start offset (bytes)
///
/// # Example
///
/// ```ignore
/// let token = MK_TOKEN!(TokenKind::Number, "42", 10);
/// ```
#[macro_export]
macro_rules! MK_TOKEN {
    ($kind:expr, $value:expr, $start:expr) => {
        Token {
            kind: $kind,
            value: $value,
            span: $crate::Span {
                start: $start,
                end: ($start) + ($value).len(),
            },
        }
    };
}

/// Declares the `TokenKind` enum together with its dotted qualified names and
/// parent links.
///
/// Each entry is `Variant => "Qualified.Name"`, optionally followed by
/// `< Parent` to place it in the hierarchy.
#[macro_export]
macro_rules! MK_TOKEN_KINDS {
    ($($variant:ident => $name:literal $(< $parent:ident)?),* $(,)?) => {
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
        pub enum TokenKind {
            $($variant),*
        }

        impl TokenKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [TokenKind] = &[$(TokenKind::$variant),*];

            /// Dotted name, e.g. `Comment.Single`.
            pub fn qualname(self) -> &'static str {
                match self {
                    $(TokenKind::$variant => $name),*
                }
            }

            pub fn parent(self) -> Option<TokenKind> {
                match self {
                    $(TokenKind::$variant => $crate::MK_TOKEN_KINDS!(@parent $($parent)?)),*
                }
            }
        }
    };
    (@parent) => { None };
    (@parent $parent:ident) => { Some(TokenKind::$parent) };
}
