//! Shared UI icons and emojis.
//!
//! Each icon carries a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Sequence indicators
pub static BOOK: Emoji<'_, '_> = Emoji("📖 ", "[B]");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "[S]");
pub static FLIP: Emoji<'_, '_> = Emoji("🔄 ", "[F]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
