//! Porter stemmer.
//!
//! Reduces an English word to its root by the five rewrite steps of the
//! classic Porter algorithm. Input is expected to be a lowercased token;
//! characters outside `a-z` are treated as consonants.

/// Stem a single lowercased token. Words of two characters or fewer are
/// returned unchanged.
pub fn stem(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    if chars.len() <= 2 {
        return word.to_string();
    }
    let mut w = Word(chars);
    w.step1a();
    w.step1b();
    w.step1c();
    w.step2();
    w.step3();
    w.step4();
    w.step5();
    w.0.into_iter().collect()
}

fn is_consonant(b: &[char], i: usize) -> bool {
    match b[i] {
        'a' | 'e' | 'i' | 'o' | 'u' => false,
        'y' => i == 0 || !is_consonant(b, i - 1),
        _ => true,
    }
}

/// Number of vowel-consonant sequences in `b`, the `m` in `[C](VC)^m[V]`.
pub(crate) fn measure(b: &[char]) -> usize {
    let n = b.len();
    let mut i = 0;
    while i < n && is_consonant(b, i) { i += 1; }
    let mut m = 0;
    loop {
        while i < n && !is_consonant(b, i) { i += 1; }
        if i >= n { return m; }
        m += 1;
        while i < n && is_consonant(b, i) { i += 1; }
        if i >= n { return m; }
    }
}

fn has_vowel(b: &[char]) -> bool {
    (0..b.len()).any(|i| !is_consonant(b, i))
}

fn ends_double_consonant(b: &[char]) -> bool {
    let n = b.len();
    n >= 2 && b[n - 1] == b[n - 2] && is_consonant(b, n - 1)
}

/// consonant-vowel-consonant ending where the last consonant is not w, x or y
fn ends_cvc(b: &[char]) -> bool {
    let n = b.len();
    n >= 3
        && is_consonant(b, n - 1)
        && !is_consonant(b, n - 2)
        && is_consonant(b, n - 3)
        && !matches!(b[n - 1], 'w' | 'x' | 'y')
}

struct Word(Vec<char>);

impl Word {
    fn ends_with(&self, suffix: &str) -> bool {
        let n = suffix.len();
        self.0.len() >= n && self.0[self.0.len() - n..].iter().copied().eq(suffix.chars())
    }

    /// The word without `suffix`; only valid after `ends_with(suffix)`.
    fn stem_of(&self, suffix: &str) -> &[char] {
        &self.0[..self.0.len() - suffix.len()]
    }

    fn replace(&mut self, suffix: &str, replacement: &str) {
        let keep = self.0.len() - suffix.len();
        self.0.truncate(keep);
        self.0.extend(replacement.chars());
    }

    /// Apply the first rule whose suffix matches, if the remaining stem has a
    /// measure above `min_measure`. Later rules are never tried once one
    /// suffix has matched.
    fn replace_first(&mut self, rules: &[(&str, &str)], min_measure: usize) {
        for (suffix, replacement) in rules {
            if self.ends_with(suffix) {
                if measure(self.stem_of(suffix)) > min_measure {
                    self.replace(suffix, replacement);
                }
                return;
            }
        }
    }

    fn step1a(&mut self) {
        if self.ends_with("sses") || self.ends_with("ies") {
            self.0.truncate(self.0.len() - 2);
        } else if !self.ends_with("ss") && self.ends_with("s") {
            self.0.pop();
        }
    }

    fn step1b(&mut self) {
        if self.ends_with("eed") {
            if measure(self.stem_of("eed")) > 0 {
                self.0.pop();
            }
            return;
        }
        let suffix = if self.ends_with("ed") {
            "ed"
        } else if self.ends_with("ing") {
            "ing"
        } else {
            return;
        };
        if !has_vowel(self.stem_of(suffix)) {
            return;
        }
        self.replace(suffix, "");

        if self.ends_with("at") || self.ends_with("bl") || self.ends_with("iz") {
            self.0.push('e');
        } else if ends_double_consonant(&self.0) && !matches!(self.0.last(), Some('l' | 's' | 'z')) {
            self.0.pop();
        } else if measure(&self.0) == 1 && ends_cvc(&self.0) {
            self.0.push('e');
        }
    }

    fn step1c(&mut self) {
        if self.ends_with("y") && has_vowel(self.stem_of("y")) {
            self.replace("y", "i");
        }
    }

    fn step2(&mut self) {
        const RULES: &[(&str, &str)] = &[
            ("ational", "ate"),
            ("tional", "tion"),
            ("enci", "ence"),
            ("anci", "ance"),
            ("izer", "ize"),
            ("bli", "ble"),
            ("alli", "al"),
            ("entli", "ent"),
            ("eli", "e"),
            ("ousli", "ous"),
            ("ization", "ize"),
            ("ation", "ate"),
            ("ator", "ate"),
            ("alism", "al"),
            ("iveness", "ive"),
            ("fulness", "ful"),
            ("ousness", "ous"),
            ("aliti", "al"),
            ("iviti", "ive"),
            ("biliti", "ble"),
            ("logi", "log"),
        ];
        self.replace_first(RULES, 0);
    }

    fn step3(&mut self) {
        const RULES: &[(&str, &str)] = &[
            ("icate", "ic"),
            ("ative", ""),
            ("alize", "al"),
            ("iciti", "ic"),
            ("ical", "ic"),
            ("ful", ""),
            ("ness", ""),
        ];
        self.replace_first(RULES, 0);
    }

    fn step4(&mut self) {
        const SUFFIXES: &[&str] = &[
            "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion",
            "ou", "ism", "ate", "iti", "ous", "ive", "ize",
        ];
        for suffix in SUFFIXES {
            if !self.ends_with(suffix) {
                continue;
            }
            let stem = self.stem_of(suffix);
            // -ion is only removed after s or t
            let allowed = *suffix != "ion" || matches!(stem.last(), Some('s' | 't'));
            if allowed && measure(stem) > 1 {
                self.replace(suffix, "");
            }
            return;
        }
    }

    fn step5(&mut self) {
        if self.ends_with("e") {
            let stem = self.stem_of("e");
            let m = measure(stem);
            if m > 1 || (m == 1 && !ends_cvc(stem)) {
                self.0.pop();
            }
        }
        if self.ends_with("ll") && measure(&self.0) > 1 {
            self.0.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> { s.chars().collect() }

    #[test]
    fn short_words_unchanged() {
        assert_eq!(stem("ox"), "ox");
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("a"), "a");
        assert_eq!(stem(""), "");
    }

    #[test]
    fn plurals_and_verb_forms() {
        assert_eq!(stem("caresses"), "caress");
        assert_eq!(stem("ponies"), "poni");
        assert_eq!(stem("caress"), "caress");
        assert_eq!(stem("cats"), "cat");
        assert_eq!(stem("feed"), "feed");
        assert_eq!(stem("agreed"), "agre");
        assert_eq!(stem("plastered"), "plaster");
        assert_eq!(stem("bled"), "bled");
        assert_eq!(stem("motoring"), "motor");
        assert_eq!(stem("sing"), "sing");
        assert_eq!(stem("conflated"), "conflat");
        assert_eq!(stem("hopping"), "hop");
        assert_eq!(stem("falling"), "fall");
        assert_eq!(stem("filing"), "file");
        assert_eq!(stem("happy"), "happi");
        assert_eq!(stem("sky"), "sky");
    }

    #[test]
    fn running_and_runs_share_a_root() {
        assert_eq!(stem("running"), "run");
        assert_eq!(stem("runs"), "run");
    }

    #[test]
    fn derivational_suffixes() {
        assert_eq!(stem("relational"), "relat");
        assert_eq!(stem("conditional"), "condit");
        assert_eq!(stem("rational"), "ration");
        assert_eq!(stem("generalization"), "gener");
        assert_eq!(stem("hopefulness"), "hope");
        assert_eq!(stem("triplicate"), "triplic");
        assert_eq!(stem("electrical"), "electr");
        assert_eq!(stem("adjustment"), "adjust");
        assert_eq!(stem("adoption"), "adopt");
        assert_eq!(stem("controlling"), "control");
        assert_eq!(stem("roll"), "roll");
    }

    #[test]
    fn non_ascii_and_digits_survive() {
        assert_eq!(stem("15"), "15");
        assert_eq!(stem("mahomes"), "mahom");
        assert_eq!(stem("café"), "café");
    }

    #[test]
    fn measure_counts_vc_sequences() {
        assert_eq!(measure(&chars("tr")), 0);
        assert_eq!(measure(&chars("tree")), 0);
        assert_eq!(measure(&chars("trouble")), 1);
        assert_eq!(measure(&chars("oats")), 1);
        assert_eq!(measure(&chars("troubles")), 2);
        assert_eq!(measure(&chars("private")), 2);
    }
}
