/// A single grammar extension, as named by a command-line flag or a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    While,
    WhileExtended,
    Arithmetic,
    ExtendedAssignment,
    If,
    IfExtended,
    MissingWhitespace,
}

/// Grammar extensions accepted on top of the base LOOP language.
///
/// The extended WHILE and IF flags imply their base flag, so a profile never
/// accepts extended relations for a construct it otherwise rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrammarProfile {
    pub allow_while: bool,
    pub allow_while_extended: bool,
    pub allow_arithmetic: bool,
    pub allow_extended_assignment: bool,
    pub allow_if: bool,
    pub allow_if_extended: bool,
    pub allow_missing_whitespace: bool,
}

impl GrammarProfile {
    pub fn base() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            allow_while: true,
            allow_while_extended: true,
            allow_arithmetic: true,
            allow_extended_assignment: true,
            allow_if: true,
            allow_if_extended: true,
            allow_missing_whitespace: true,
        }
    }

    /// Arithmetic, extended assignments and extended IF: the usual exam dialect.
    pub fn exam() -> Self {
        Self::base()
            .with_arithmetic()
            .with_extended_assignment()
            .with_if_extended()
    }

    pub fn with_while(mut self) -> Self {
        self.allow_while = true;
        self
    }

    pub fn with_while_extended(mut self) -> Self {
        self.allow_while = true;
        self.allow_while_extended = true;
        self
    }

    pub fn with_arithmetic(mut self) -> Self {
        self.allow_arithmetic = true;
        self
    }

    pub fn with_extended_assignment(mut self) -> Self {
        self.allow_extended_assignment = true;
        self
    }

    pub fn with_if(mut self) -> Self {
        self.allow_if = true;
        self
    }

    pub fn with_if_extended(mut self) -> Self {
        self.allow_if = true;
        self.allow_if_extended = true;
        self
    }

    pub fn with_missing_whitespace(mut self) -> Self {
        self.allow_missing_whitespace = true;
        self
    }

    pub fn with_extension(self, extension: Extension) -> Self {
        match extension {
            Extension::While => self.with_while(),
            Extension::WhileExtended => self.with_while_extended(),
            Extension::Arithmetic => self.with_arithmetic(),
            Extension::ExtendedAssignment => self.with_extended_assignment(),
            Extension::If => self.with_if(),
            Extension::IfExtended => self.with_if_extended(),
            Extension::MissingWhitespace => self.with_missing_whitespace(),
        }
    }

    /// Enables each extension whose paired flag is set.
    pub fn with_flags(self, flags: impl IntoIterator<Item = (Extension, bool)>) -> Self {
        flags
            .into_iter()
            .filter(|&(_, enabled)| enabled)
            .fold(self, |profile, (extension, _)| profile.with_extension(extension))
    }

    pub fn while_loops(&self) -> bool {
        self.allow_while || self.allow_while_extended
    }

    pub fn if_branches(&self) -> bool {
        self.allow_if || self.allow_if_extended
    }

    /// True when every extension enabled in `self` is also enabled in `other`.
    pub fn is_subset_of(&self, other: &GrammarProfile) -> bool {
        let flags = |p: &GrammarProfile| {
            [
                p.while_loops(),
                p.allow_while_extended,
                p.allow_arithmetic,
                p.allow_extended_assignment,
                p.if_branches(),
                p.allow_if_extended,
                p.allow_missing_whitespace,
            ]
        };
        flags(self)
            .iter()
            .zip(flags(other).iter())
            .all(|(mine, theirs)| !mine || *theirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_flags_imply_base_flags() {
        let profile = GrammarProfile::base().with_while_extended();
        assert!(profile.while_loops());
        let raw = GrammarProfile {
            allow_if_extended: true,
            ..GrammarProfile::base()
        };
        assert!(raw.if_branches());
    }

    #[test]
    fn exam_preset_matches_flags() {
        let exam = GrammarProfile::exam();
        assert!(exam.allow_arithmetic && exam.allow_extended_assignment);
        assert!(exam.allow_if && exam.allow_if_extended);
        assert!(!exam.while_loops());
        assert!(!exam.allow_missing_whitespace);
    }

    #[test]
    fn flags_enable_only_set_extensions() {
        let profile = GrammarProfile::base().with_flags([
            (Extension::IfExtended, true),
            (Extension::Arithmetic, false),
            (Extension::MissingWhitespace, true),
        ]);
        assert_eq!(
            profile,
            GrammarProfile::base()
                .with_if_extended()
                .with_missing_whitespace()
        );
        assert_eq!(
            GrammarProfile::base().with_extension(Extension::WhileExtended),
            GrammarProfile::base().with_while_extended()
        );
    }

    #[test]
    fn subset_ordering() {
        assert!(GrammarProfile::base().is_subset_of(&GrammarProfile::exam()));
        assert!(GrammarProfile::exam().is_subset_of(&GrammarProfile::all()));
        assert!(!GrammarProfile::all().is_subset_of(&GrammarProfile::exam()));
    }
}
