//! Bilingual stopword registry.
//!
//! Stopword lists for every configured language are merged into a single
//! [`StopwordSet`] applied uniformly to all documents. There is no
//! per-document language detection: a French document is filtered with the
//! English list too, and vice versa. Weighting languages separately would
//! bias TF-IDF toward whichever list is shorter.
//!
//! Each language first tries an external [`StopwordSource`] (by default an
//! NLTK-style directory with one file per language). When that fails the
//! built-in list for the language is used instead, so resolution never fails
//! as a whole.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Languages with a stopword list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    French,
}

impl Language {
    /// Parse a language code (`en`, `fr`) or NLTK name (`english`, `french`).
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Language::English),
            "fr" | "fra" | "fre" | "french" | "français" | "francais" => Some(Language::French),
            _ => None,
        }
    }

    /// File name used by NLTK's `corpora/stopwords` layout.
    pub fn nltk_name(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "french",
        }
    }

    pub fn builtin(&self) -> &'static [&'static str] {
        match self {
            Language::English => BUILTIN_ENGLISH,
            Language::French => BUILTIN_FRENCH,
        }
    }
}

/// An immutable, lowercase set of stopwords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    /// An empty set: nothing is filtered.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| normalize_word(w.as_ref()))
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn extend(&mut self, other: StopwordSet) {
        self.words.extend(other.words);
    }
}

fn normalize_word(word: &str) -> String {
    word.trim().replace('\u{2019}', "'").to_lowercase()
}

/// Provider of externally maintained stopword lists.
pub trait StopwordSource: Send + Sync {
    /// Load the list for `language`. Any error makes the registry fall back
    /// to the built-in list.
    fn load(&self, language: Language) -> std::io::Result<Vec<String>>;
}

/// Reads `<dir>/<nltk name>` files, one word per line. Blank lines and
/// `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StopwordSource for DirectorySource {
    fn load(&self, language: Language) -> std::io::Result<Vec<String>> {
        let path = self.dir.join(language.nltk_name());
        let content = std::fs::read_to_string(&path)?;
        let words: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();
        if words.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("empty stopword list: {}", path.display()),
            ));
        }
        Ok(words)
    }
}

/// A source with no external lists; every language uses its built-in list.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinOnly;

impl StopwordSource for BuiltinOnly {
    fn load(&self, language: Language) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no external list for {}", language.nltk_name()),
        ))
    }
}

/// Resolves and caches merged stopword sets.
///
/// Construct one per process and hand the resolved set to the engine;
/// tests build their own registry around a custom source.
pub struct StopwordRegistry {
    source: Box<dyn StopwordSource>,
    cache: Mutex<HashMap<Vec<Language>, Arc<StopwordSet>>>,
}

impl StopwordRegistry {
    pub fn new(source: impl StopwordSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed only by the built-in lists.
    pub fn builtin() -> Self {
        Self::new(BuiltinOnly)
    }

    /// Registry reading an NLTK-style directory, if one is configured.
    pub fn from_dir(dir: Option<&Path>) -> Self {
        match dir {
            Some(d) => Self::new(DirectorySource::new(d)),
            None => Self::builtin(),
        }
    }

    /// Merge the stopword lists of `languages` into one set.
    ///
    /// Unknown codes are logged and skipped. Results are cached per
    /// language list for the lifetime of the registry.
    pub fn resolve<S: AsRef<str>>(&self, languages: &[S]) -> Arc<StopwordSet> {
        let mut parsed: Vec<Language> = Vec::new();
        for code in languages {
            match Language::parse(code.as_ref()) {
                Some(lang) if !parsed.contains(&lang) => parsed.push(lang),
                Some(_) => {}
                None => warn!(language = code.as_ref(), "no stopword list for language, skipping"),
            }
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(set) = cache.get(&parsed) {
            return Arc::clone(set);
        }

        let mut merged = StopwordSet::empty();
        for lang in &parsed {
            merged.extend(self.load_one(*lang));
        }
        debug!(languages = ?parsed, words = merged.len(), "stopword set resolved");

        let merged = Arc::new(merged);
        cache.insert(parsed, Arc::clone(&merged));
        merged
    }

    fn load_one(&self, lang: Language) -> StopwordSet {
        match self.source.load(lang) {
            Ok(words) => StopwordSet::from_words(words),
            Err(e) => {
                warn!(
                    language = lang.nltk_name(),
                    error = %e,
                    "external stopword list unavailable, using built-in list"
                );
                StopwordSet::from_words(lang.builtin())
            }
        }
    }
}

impl Default for StopwordRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// English fallback list (NLTK `english`).
pub const BUILTIN_ENGLISH: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// French fallback list (NLTK `french`).
pub const BUILTIN_FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux", "il",
    "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes", "moi", "mon",
    "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa",
    "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos", "votre",
    "vous", "c", "d", "j", "l", "à", "m", "n", "s", "t", "y", "été", "étée", "étées", "étés",
    "étant", "étante", "étants", "étantes", "suis", "es", "est", "sommes", "êtes", "sont",
    "serai", "seras", "sera", "serons", "serez", "seront", "serais", "serait", "serions",
    "seriez", "seraient", "étais", "était", "étions", "étiez", "étaient", "fus", "fut", "fûmes",
    "fûtes", "furent", "sois", "soit", "soyons", "soyez", "soient", "fusse", "fusses", "fût",
    "fussions", "fussiez", "fussent", "ayant", "ayante", "ayantes", "ayants", "eu", "eue", "eues",
    "eus", "ai", "as", "avons", "avez", "ont", "aurai", "auras", "aura", "aurons", "aurez",
    "auront", "aurais", "aurait", "aurions", "auriez", "auraient", "avais", "avait", "avions",
    "aviez", "avaient", "eut", "eûmes", "eûtes", "eurent", "aie", "aies", "ait", "ayons", "ayez",
    "aient", "eusse", "eusses", "eût", "eussions", "eussiez", "eussent",
];
