//! Free-text cart commands
//!
//! "agrega 2 smartphones y 1 mouse al carrito" is reduced to an action and a
//! list of (product text, quantity) pairs. Resolving the product text against
//! the catalog is left to the backend.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest quantity a single cart line may ask for
pub const MAX_CART_QUANTITY: i32 = 999;

/// Shortest query that gets autocomplete suggestions
pub const MIN_SUGGESTION_QUERY_CHARS: usize = 2;

pub const MAX_SUGGESTIONS: i64 = 5;

/// Words shorter than this are not searched on their own
const MIN_SEARCH_WORD_CHARS: usize = 4;

const CLEAR_PHRASES: [&str; 2] = ["borrar todo", "quitar todo"];
const CLEAR_WORDS: [&str; 4] = ["vacía", "vacia", "vaciar", "limpiar"];
const REMOVE_WORDS: [&str; 8] = [
    "quita", "quitar", "elimina", "eliminar", "borra", "borrar", "saca", "sacar",
];
const ADD_WORDS: [&str; 8] = [
    "agrega", "agregar", "añade", "añadir", "quiero", "dame", "comprar", "necesito",
];
const FILLER_WORDS: [&str; 16] = [
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "a", "mi", "por",
    "favor", "carrito",
];

lazy_static! {
    static ref SEPARATOR: Regex = Regex::new(r"\s*,\s*|\s+y\s+").unwrap();
    static ref QUANTITY_LINE: Regex = Regex::new(r"(\d+)\s+([\p{L}][\p{L}\s]*)").unwrap();
    static ref WORD: Regex = Regex::new(r"[\p{L}\d]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    Add,
    Remove,
    Clear,
}

impl CartAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartAction::Add => "add",
            CartAction::Remove => "remove",
            CartAction::Clear => "clear",
        }
    }
}

/// One product mention and how many units were asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineRequest {
    pub search: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCommand {
    pub action: CartAction,
    pub items: Vec<CartLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartCommandError {
    #[error("the prompt is empty")]
    EmptyPrompt,

    #[error("no products could be identified in the command")]
    NoProducts,

    #[error("quantity for \"{search}\" must be between 1 and {max}")]
    QuantityOutOfRange { search: String, max: i32 },
}

impl CartCommandError {
    pub fn message_es(&self) -> String {
        match self {
            CartCommandError::EmptyPrompt => "El campo \"prompt\" es requerido".to_string(),
            CartCommandError::NoProducts => {
                "No se pudieron identificar productos en el comando.".to_string()
            }
            CartCommandError::QuantityOutOfRange { search, max } => {
                format!("La cantidad de \"{}\" debe estar entre 1 y {}", search, max)
            }
        }
    }
}

fn words(text: &str) -> Vec<&str> {
    WORD.find_iter(text).map(|m| m.as_str()).collect()
}

fn detect_action(text: &str, tokens: &[&str]) -> CartAction {
    let has = |list: &[&str]| tokens.iter().any(|t| list.contains(t));
    if CLEAR_PHRASES.iter().any(|p| text.contains(p)) || has(&CLEAR_WORDS) {
        CartAction::Clear
    } else if has(&REMOVE_WORDS) {
        CartAction::Remove
    } else {
        CartAction::Add
    }
}

/// Drop filler and command words, keeping the product text
fn clean_name(text: &str) -> String {
    words(text)
        .into_iter()
        .filter(|w| {
            !FILLER_WORDS.contains(w)
                && !ADD_WORDS.contains(w)
                && !REMOVE_WORDS.contains(w)
                && !CLEAR_WORDS.contains(w)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn quantified_lines(text: &str) -> Result<Vec<CartLineRequest>, CartCommandError> {
    let mut lines = Vec::new();
    for segment in SEPARATOR.split(text) {
        let Some(caps) = QUANTITY_LINE.captures(segment) else {
            continue;
        };
        let search = clean_name(&caps[2]);
        if search.is_empty() {
            continue;
        }
        let quantity = caps[1]
            .parse::<i32>()
            .ok()
            .filter(|q| (1..=MAX_CART_QUANTITY).contains(q))
            .ok_or_else(|| CartCommandError::QuantityOutOfRange {
                search: search.clone(),
                max: MAX_CART_QUANTITY,
            })?;
        lines.push(CartLineRequest { search, quantity });
    }
    Ok(lines)
}

/// Interpret a cart command typed or dictated in Spanish
pub fn parse_cart_command(prompt: &str) -> Result<CartCommand, CartCommandError> {
    let text = prompt.trim().to_lowercase();
    if text.is_empty() {
        return Err(CartCommandError::EmptyPrompt);
    }

    let action = detect_action(&text, &words(&text));
    if action == CartAction::Clear {
        return Ok(CartCommand {
            action,
            items: Vec::new(),
        });
    }

    let mut items = quantified_lines(&text)?;
    if items.is_empty() {
        // no "<n> <product>" pairs: the whole remaining text is one unit
        let search = clean_name(&text);
        if !search.is_empty() {
            items.push(CartLineRequest {
                search,
                quantity: 1,
            });
        }
    }

    if items.is_empty() {
        return Err(CartCommandError::NoProducts);
    }
    Ok(CartCommand { action, items })
}

/// Individual words of a product mention worth searching for on their own
pub fn fallback_search_words(search: &str) -> Vec<&str> {
    search
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_SEARCH_WORD_CHARS)
        .collect()
}

/// `%term%` for ILIKE with the wildcard characters in `term` escaped
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
