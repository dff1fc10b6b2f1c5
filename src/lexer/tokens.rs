use lazy_static::lazy_static;
use serde::{Serialize, Serializer};
use std::{collections::HashMap, fmt::Display};

use crate::{Span, MK_TOKEN_KINDS};

MK_TOKEN_KINDS! {
    Text => "Text",
    Whitespace => "Text.Whitespace" < Text,
    Error => "Error",
    Other => "Other",

    Keyword => "Keyword",
    KeywordConstant => "Keyword.Constant" < Keyword,
    KeywordDeclaration => "Keyword.Declaration" < Keyword,
    KeywordNamespace => "Keyword.Namespace" < Keyword,
    KeywordPseudo => "Keyword.Pseudo" < Keyword,
    KeywordReserved => "Keyword.Reserved" < Keyword,
    KeywordType => "Keyword.Type" < Keyword,
    KeywordVariable => "Keyword.Variable" < Keyword,

    Name => "Name",
    NameAttribute => "Name.Attribute" < Name,
    NameBuiltin => "Name.Builtin" < Name,
    NameBuiltinPseudo => "Name.Builtin.Pseudo" < NameBuiltin,
    NameClass => "Name.Class" < Name,
    NameConstant => "Name.Constant" < Name,
    NameDecorator => "Name.Decorator" < Name,
    NameEntity => "Name.Entity" < Name,
    NameException => "Name.Exception" < Name,
    NameFunction => "Name.Function" < Name,
    NameFunctionMagic => "Name.Function.Magic" < NameFunction,
    NameProperty => "Name.Property" < Name,
    NameLabel => "Name.Label" < Name,
    NameNamespace => "Name.Namespace" < Name,
    NameOther => "Name.Other" < Name,
    NameTag => "Name.Tag" < Name,
    NameVariable => "Name.Variable" < Name,
    NameVariableClass => "Name.Variable.Class" < NameVariable,
    NameVariableGlobal => "Name.Variable.Global" < NameVariable,
    NameVariableInstance => "Name.Variable.Instance" < NameVariable,
    NameVariableMagic => "Name.Variable.Magic" < NameVariable,

    Literal => "Literal",
    LiteralDate => "Literal.Date" < Literal,
    String => "Literal.String" < Literal,
    StringAffix => "Literal.String.Affix" < String,
    StringBacktick => "Literal.String.Backtick" < String,
    StringChar => "Literal.String.Char" < String,
    StringDelimiter => "Literal.String.Delimiter" < String,
    StringDoc => "Literal.String.Doc" < String,
    StringDouble => "Literal.String.Double" < String,
    StringEscape => "Literal.String.Escape" < String,
    StringHeredoc => "Literal.String.Heredoc" < String,
    StringInterpol => "Literal.String.Interpol" < String,
    StringOther => "Literal.String.Other" < String,
    StringRegex => "Literal.String.Regex" < String,
    StringSingle => "Literal.String.Single" < String,
    StringSymbol => "Literal.String.Symbol" < String,
    Number => "Literal.Number" < Literal,
    NumberBin => "Literal.Number.Bin" < Number,
    NumberFloat => "Literal.Number.Float" < Number,
    NumberHex => "Literal.Number.Hex" < Number,
    NumberInteger => "Literal.Number.Integer" < Number,
    NumberIntegerLong => "Literal.Number.Integer.Long" < NumberInteger,
    NumberOct => "Literal.Number.Oct" < Number,
    NumberOther => "Literal.Number.Other" < Number,

    Operator => "Operator",
    OperatorWord => "Operator.Word" < Operator,

    Punctuation => "Punctuation",
    PunctuationIndicator => "Punctuation.Indicator" < Punctuation,

    Comment => "Comment",
    CommentDoc => "Comment.Doc" < Comment,
    CommentHashbang => "Comment.Hashbang" < Comment,
    CommentMultiline => "Comment.Multiline" < Comment,
    CommentPreproc => "Comment.Preproc" < Comment,
    CommentPreprocFile => "Comment.PreprocFile" < Comment,
    CommentSingle => "Comment.Single" < Comment,
    CommentSpecial => "Comment.Special" < Comment,

    Generic => "Generic",
    GenericDeleted => "Generic.Deleted" < Generic,
    GenericEmph => "Generic.Emph" < Generic,
    GenericError => "Generic.Error" < Generic,
    GenericHeading => "Generic.Heading" < Generic,
    GenericInserted => "Generic.Inserted" < Generic,
    GenericLineno => "Generic.Lineno" < Generic,
    GenericOutput => "Generic.Output" < Generic,
    GenericPrompt => "Generic.Prompt" < Generic,
    GenericStrong => "Generic.Strong" < Generic,
    GenericSubheading => "Generic.Subheading" < Generic,
    GenericTraceback => "Generic.Traceback" < Generic,
}

lazy_static! {
    pub static ref KIND_LOOKUP: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        for kind in TokenKind::ALL {
            map.insert(kind.qualname(), *kind);
        }
        map
    };
}

// Shorthands accepted in front of a dotted name.
const PREFIX_ALIASES: [(&str, &str); 4] = [
    ("String", "Literal.String"),
    ("Str", "Literal.String"),
    ("Number", "Literal.Number"),
    ("Num", "Literal.Number"),
];

impl TokenKind {
    /// Looks a kind up by its dotted name. `Str.Char`, `String.Char`,
    /// `Num.Float` and `Number.Float` are accepted as shorthands.
    pub fn from_qualname(name: &str) -> Option<TokenKind> {
        if let Some(kind) = KIND_LOOKUP.get(name) {
            return Some(*kind);
        }

        for (alias, full) in PREFIX_ALIASES {
            if let Some(rest) = name.strip_prefix(alias) {
                if rest.is_empty() || rest.starts_with('.') {
                    let expanded = format!("{}{}", full, rest);
                    return KIND_LOOKUP.get(expanded.as_str()).copied();
                }
            }
        }

        None
    }

    /// True when `self` is `other` or one of its descendants.
    pub fn is_a(self, other: TokenKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }

        false
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualname())
    }
}

impl Serialize for TokenKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.qualname())
    }
}

/// A classified span of the input. `value` borrows the input text and
/// `span` holds absolute byte offsets into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub value: &'s str,
    pub span: Span,
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?} @{}", self.kind, self.value, self.span.start)
    }
}

impl Token<'_> {
    pub fn is_one_of_many(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|kind| self.kind.is_a(*kind))
    }
}
