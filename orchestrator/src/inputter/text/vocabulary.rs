use std::collections::HashMap;

/// The tokens a text model predicts, indexed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    items: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary from the contents of a vocab file.
    ///
    /// The token is the first space separated column of each line; `\n` and `\s` stand for a
    /// newline and a space. Lines are expected most frequent first.
    ///
    /// # Arguments
    /// * `contents` - The file contents.
    /// * `top_k` - Keeps the first `top_k` tokens, 0 keeps all of them.
    pub fn from_listing(contents: &str, top_k: usize) -> Self {
        contents
            .lines()
            .filter_map(|line| line.split(' ').next())
            .filter(|token| !token.is_empty())
            .map(unescape)
            .take(if top_k == 0 { usize::MAX } else { top_k })
            .collect()
    }

    /// Builds a vocabulary ordered by frequency, ties going to the first token seen.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S], top_k: usize) -> Self {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, token) in tokens.iter().enumerate() {
            counts.entry(token.as_ref()).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> = counts
            .into_iter()
            .map(|(token, (count, first))| (token, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        if top_k > 0 {
            ranked.truncate(top_k);
        }

        ranked.into_iter().map(|(token, _, _)| token.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.items.get(id).map(String::as_str)
    }

    /// Maps tokens to ids, dropping the ones outside the vocabulary.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().filter_map(|t| self.id(t.as_ref())).collect()
    }
}

impl FromIterator<String> for Vocabulary {
    /// Collects tokens in order, ignoring repeated ones.
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut vocab = Self::default();
        for token in iter {
            if !vocab.ids.contains_key(&token) {
                vocab.ids.insert(token.clone(), vocab.items.len());
                vocab.items.push(token);
            }
        }
        vocab
    }
}

fn unescape(token: &str) -> String {
    match token {
        r"\n" => "\n".to_string(),
        r"\s" => " ".to_string(),
        token => token.to_string(),
    }
}
