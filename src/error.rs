//! Rich diagnostic error types for the terms engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Every failure is local to a single
//! operation: the lexicon, fact trie and rule network are validated before
//! anything is mutated, so callers may retry freely.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the terms engine.
#[derive(Debug, Error, Diagnostic)]
pub enum TermsError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fact(#[from] FactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Lexicon errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LexiconError {
    #[error("term not found: {name}")]
    #[diagnostic(
        code(terms::lexicon::not_found),
        help("Define the term first with `define_type` or `define_instance`.")
    )]
    TermNotFound { name: String },

    #[error("term defined more than once: {name}")]
    #[diagnostic(
        code(terms::lexicon::repeated),
        help(
            "A term name identifies exactly one term. Redefining a term is only \
             allowed when the new definition is identical to the existing one."
        )
    )]
    TermRepeated { name: String },

    #[error("illegal slot label: {label:?}")]
    #[diagnostic(
        code(terms::lexicon::illegal_label),
        help(
            "Labels starting with an underscore are reserved for structural path \
             markers (_verb, _neg, _label, _term). Choose a plain identifier."
        )
    )]
    IllegalLabel { label: String },

    #[error("not a variable token: {token}")]
    #[diagnostic(
        code(terms::lexicon::invalid_variable),
        help(
            "Variables are a capitalised type name, an optional `Noun`/`Verb` marker \
             and optional trailing digits, e.g. `Person`, `Person1`, `ThingNoun2`, `N1`."
        )
    )]
    InvalidVariable { token: String },

    #[error("{name} is not a type")]
    #[diagnostic(
        code(terms::lexicon::not_a_type),
        help("Only types (nouns, verbs and their kinds) can be used as bases or as the type of an instance.")
    )]
    NotAType { name: String },

    #[error("bases of {name} belong to different families")]
    #[diagnostic(
        code(terms::lexicon::mixed_bases),
        help("All bases of a type must be nouns, or all verbs, or all kinds of the same family.")
    )]
    MixedBases { name: String },

    #[error("{name} is not a verb and cannot declare slots")]
    #[diagnostic(
        code(terms::lexicon::unexpected_slots),
        help("Only verb-family types (subtypes of `exists`) take labelled arguments.")
    )]
    UnexpectedSlots { name: String },

    #[error("type {name} was defined without bases")]
    #[diagnostic(
        code(terms::lexicon::no_bases),
        help("Every new type needs at least one base, e.g. `thing` for nouns or `exists` for verbs.")
    )]
    NoBases { name: String },

    #[error("cannot name an instance {name} of verb {verb}")]
    #[diagnostic(
        code(terms::lexicon::verb_instance),
        help("Instances of verbs are predicates. Assert a fact instead of defining a name.")
    )]
    VerbInstance { name: String, verb: String },

    #[error("illegal term name: {name}")]
    #[diagnostic(
        code(terms::lexicon::illegal_name),
        help("Names that read as numbers belong to number terms. Pick a name that is not a number.")
    )]
    IllegalName { name: String },

    #[error("invalid number: {text}")]
    #[diagnostic(
        code(terms::lexicon::invalid_number),
        help("Numbers must be finite.")
    )]
    InvalidNumber { text: String },
}

// ---------------------------------------------------------------------------
// Fact errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FactError {
    #[error("{verb} requires an argument labelled {label}")]
    #[diagnostic(
        code(terms::fact::missing_object),
        help("Every slot declared by the verb (and inherited from its bases) must be filled.")
    )]
    MissingObject { verb: String, label: String },

    #[error("contradiction: {message}")]
    #[diagnostic(
        code(terms::fact::contradiction),
        help(
            "The store never holds a fact and its negation, and never drops a fact \
             another fact still relies on. Retract the conflicting fact first."
        )
    )]
    Contradiction { message: String },

    #[error("cannot assert a fact with variables: {fact}")]
    #[diagnostic(
        code(terms::fact::not_ground),
        help("Variables belong in queries and rule premises. Replace them with concrete terms.")
    )]
    NotGround { fact: String },

    #[error("{name} is not a verb")]
    #[diagnostic(
        code(terms::fact::not_a_verb),
        help("The head of a fact must be a verb, i.e. a subtype of `exists`.")
    )]
    NotAVerb { name: String },

    #[error("{verb} has no slot labelled {label}")]
    #[diagnostic(
        code(terms::fact::unknown_label),
        help("Declare the slot on the verb (or one of its bases) before using it.")
    )]
    UnknownLabel { verb: String, label: String },

    #[error("argument {label} of {verb} must be a {expected}, got {found}")]
    #[diagnostic(
        code(terms::fact::wrong_object_type),
        help("Slot fillers must be instances of the slot type declared on the verb.")
    )]
    WrongObjectType {
        verb: String,
        label: String,
        expected: String,
        found: String,
    },

    #[error("no such fact: {fact}")]
    #[diagnostic(
        code(terms::fact::not_found),
        help("Only stored facts can be retracted. Ask for it first to check it exists.")
    )]
    NotFound { fact: String },
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("a rule needs at least one premise")]
    #[diagnostic(code(terms::rule::no_premises))]
    NoPremises,

    #[error("variable {var} is never bound by a premise")]
    #[diagnostic(
        code(terms::rule::unbound_consequence),
        help("Variables read by conditions or consequences must occur in a premise or be assigned by an earlier code guard.")
    )]
    UnboundConsequence { var: String },

    #[error("guard syntax error at {position}: {message}")]
    #[diagnostic(
        code(terms::rule::guard_syntax),
        help("Guards are `;`-separated assignments `Name = expr` and a final boolean expression.")
    )]
    GuardSyntax { position: usize, message: String },

    #[error("guard evaluation failed: {message}")]
    #[diagnostic(
        code(terms::rule::guard),
        help("Set `condition = false` before a statement that may fail to make the failure expected.")
    )]
    Guard { message: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(terms::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(terms::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             If the problem persists, try a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(terms::store::serde),
        help(
            "Failed to serialize or deserialize the knowledge base. \
             The stored format may come from an incompatible version."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(terms::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(terms::engine::data_dir),
        help("Ensure the path exists and has read/write permissions.")
    )]
    DataDir { path: String },

    #[error("engine lock poisoned")]
    #[diagnostic(
        code(terms::engine::lock_poisoned),
        help("A writer panicked while holding the knowledge base lock. Reopen the engine.")
    )]
    LockPoisoned,

    #[error("config file error: {path}: {message}")]
    #[diagnostic(
        code(terms::engine::config),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Config { path: String, message: String },

    #[error("invalid program: {message}")]
    #[diagnostic(
        code(terms::engine::program),
        help("A program is a JSON array of operations, each an object with an `op` field.")
    )]
    Program { message: String },
}

/// Convenience alias for functions returning engine results.
pub type TermsResult<T> = std::result::Result<T, TermsError>;
