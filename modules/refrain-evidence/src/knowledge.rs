//! Domain lexicon used by the text analyzer and the cross-dimension rules.
//!
//! The built-in lexicon can be extended by a `lexicon.json` overlay in a
//! knowledge directory. [`KnowledgeCache`] is built once at start-up and
//! shared by `Arc`; nothing here is global.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use refrain_common::Result;

pub const OVERLAY_FILE: &str = "lexicon.json";

/// A named group of words a comment section may gravitate to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub label: String,
    pub words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    /// Ordered; ties in theme scoring keep this order.
    pub themes: Vec<Theme>,
    /// Late-night sadness vocabulary.
    pub melancholy: Vec<String>,
    /// Vocabulary of comments that talk about the music itself.
    pub music_terms: Vec<String>,
    /// Narrative markers of personal stories.
    pub story_markers: Vec<String>,
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    /// Characters that disqualify a bigram from being a keyword.
    pub stop_chars: String,
}

/// Partial lexicon read from the overlay file. Present lists replace the
/// built-in ones, themes are replaced by id or appended.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LexiconOverlay {
    themes: Vec<Theme>,
    melancholy: Option<Vec<String>>,
    music_terms: Option<Vec<String>>,
    story_markers: Option<Vec<String>>,
    positive: Option<Vec<String>>,
    negative: Option<Vec<String>>,
    stop_chars: Option<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Lexicon {
    pub fn builtin() -> Self {
        let theme = |id: &str, label: &str, list: &[&str]| Theme {
            id: id.to_string(),
            label: label.to_string(),
            words: words(list),
        };
        Self {
            themes: vec![
                theme("nostalgia", "怀旧", &["青春", "回忆", "那年", "时光", "曾经", "当年", "想起", "年轻"]),
                theme("emotion", "情感", &["感动", "眼泪", "哭", "心", "爱", "难过", "伤心", "痛"]),
                theme("music", "音乐", &["旋律", "编曲", "唱功", "好听", "经典", "神曲", "歌词"]),
                theme("story", "故事", &["记得", "那时", "故事", "后来", "从前", "第一次"]),
            ],
            melancholy: words(&[
                "孤独", "深夜", "失眠", "难过", "眼泪", "哭", "心碎", "分手", "伤心", "想你", "思念", "抑郁",
                "凌晨", "一个人", "寂寞", "泪", "痛",
            ]),
            music_terms: words(&[
                "编曲", "作词", "作曲", "音色", "吉他", "贝斯", "混音", "前奏", "和声", "唱功", "旋律", "歌词",
                "副歌",
            ]),
            story_markers: words(&[
                "记得", "那年", "那时", "当时", "曾经", "后来", "故事", "第一次", "小时候", "以前",
            ]),
            positive: words(&[
                "好听", "喜欢", "爱", "开心", "快乐", "温暖", "感动", "美好", "幸福", "经典", "治愈", "希望",
                "加油", "笑", "棒", "赞", "美", "甜", "温柔", "感谢",
            ]),
            negative: words(&[
                "难过", "伤心", "哭", "痛", "孤独", "寂寞", "失眠", "心碎", "分手", "抑郁", "眼泪", "泪",
                "遗憾", "后悔", "绝望", "累", "苦", "死", "恨", "烦",
            ]),
            stop_chars: "的了是我你他她它在也都就和有这那啊吧呢吗呀哦嗯一不个人着很没还要会到说去来被把给让对"
                .to_string(),
        }
    }

    pub fn theme(&self, id: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.id == id)
    }

    /// Every word the lexicon knows, longest first. Used as a keyword dictionary.
    pub fn vocabulary(&self) -> Vec<&str> {
        let mut vocab: Vec<&str> = self
            .themes
            .iter()
            .flat_map(|t| t.words.iter())
            .chain(&self.melancholy)
            .chain(&self.music_terms)
            .chain(&self.story_markers)
            .chain(&self.positive)
            .chain(&self.negative)
            .map(String::as_str)
            .collect();
        vocab.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        vocab.dedup();
        vocab
    }

    fn apply(&mut self, overlay: LexiconOverlay) {
        for theme in overlay.themes {
            match self.themes.iter_mut().find(|t| t.id == theme.id) {
                Some(existing) => *existing = theme,
                None => self.themes.push(theme),
            }
        }
        if let Some(v) = overlay.melancholy {
            self.melancholy = v;
        }
        if let Some(v) = overlay.music_terms {
            self.music_terms = v;
        }
        if let Some(v) = overlay.story_markers {
            self.story_markers = v;
        }
        if let Some(v) = overlay.positive {
            self.positive = v;
        }
        if let Some(v) = overlay.negative {
            self.negative = v;
        }
        if let Some(v) = overlay.stop_chars {
            self.stop_chars = v;
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeCache
// ---------------------------------------------------------------------------

/// Loads the lexicon lazily and keeps it until invalidated.
pub struct KnowledgeCache {
    dir: Option<PathBuf>,
    cached: RwLock<Option<Arc<Lexicon>>>,
}

impl KnowledgeCache {
    /// Built-in lexicon only.
    pub fn builtin() -> Self {
        Self::new(None)
    }

    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cached: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Result<Arc<Lexicon>> {
        if let Some(lexicon) = self.cached.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Ok(lexicon.clone());
        }
        self.reload()
    }

    /// Drop the cached lexicon. The next `get` reads the overlay again.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Re-read the overlay now. On failure the previous lexicon stays cached.
    pub fn reload(&self) -> Result<Arc<Lexicon>> {
        let lexicon = Arc::new(load(self.dir.as_deref())?);
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(lexicon.clone());
        Ok(lexicon)
    }
}

fn load(dir: Option<&Path>) -> Result<Lexicon> {
    let mut lexicon = Lexicon::builtin();
    let Some(dir) = dir else {
        return Ok(lexicon);
    };
    let path = dir.join(OVERLAY_FILE);
    if !path.exists() {
        return Ok(lexicon);
    }
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let overlay: LexiconOverlay =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    lexicon.apply(overlay);
    info!(path = %path.display(), themes = lexicon.themes.len(), "Lexicon overlay loaded");
    Ok(lexicon)
}
