use image::Rgb;

/// The fixed emotion vocabulary produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Classifier output order (FER2013).
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Parse a detector label, ignoring case
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|emotion| emotion.label().eq_ignore_ascii_case(label.trim()))
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn color(self) -> Rgb<u8> {
        match self {
            Emotion::Happy => Rgb([255, 223, 0]),
            Emotion::Neutral => Rgb([200, 200, 200]),
            Emotion::Sad => Rgb([147, 112, 219]),
            Emotion::Angry => Rgb([220, 20, 60]),
            Emotion::Surprise => Rgb([255, 165, 0]),
            Emotion::Fear => Rgb([138, 43, 226]),
            Emotion::Disgust => Rgb([50, 205, 50]),
        }
    }

    pub fn compliments(self) -> &'static [&'static str] {
        match self {
            Emotion::Happy => &[
                "Your smile brightens everyone's day!",
                "That genuine happiness is contagious!",
                "You have such a warm, inviting presence!",
                "Your joy creates ripples of positivity!",
                "Keep shining with that beautiful energy!",
            ],
            Emotion::Neutral => &[
                "Your calm presence is so grounding!",
                "There's strength in your composure!",
                "Your steady energy is admirable!",
                "You bring balance wherever you go!",
                "Your mindful presence is appreciated!",
            ],
            Emotion::Sad => &[
                "You're stronger than you know!",
                "Every storm passes - hang in there!",
                "Your resilience is truly inspiring!",
                "Better days are coming - believe it!",
                "You're never alone in this journey!",
            ],
            Emotion::Angry => &[
                "Channel that energy into positive change!",
                "Your passion can move mountains!",
                "Transform that fire into motivation!",
                "Your intensity can spark amazing things!",
                "Use that power to achieve greatness!",
            ],
            Emotion::Surprise => &[
                "Your wonderment is refreshing!",
                "Stay curious and keep exploring!",
                "Life is full of amazing discoveries!",
                "Your enthusiasm is infectious!",
                "Keep embracing new experiences!",
            ],
            Emotion::Fear => &[
                "Courage isn't fearlessness - it's facing fear!",
                "You're braver than you believe!",
                "Every step forward conquers fear!",
                "Your strength shines through uncertainty!",
                "Fear is temporary - your courage is permanent!",
            ],
            Emotion::Disgust => &[
                "Your standards show self-respect!",
                "Trust your instincts - they serve you well!",
                "Your boundaries protect your peace!",
                "Standing firm shows inner strength!",
                "Your authenticity is powerful!",
            ],
        }
    }
}

/// Annotation color for labels outside the vocabulary.
pub const DEFAULT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Compliment used for labels outside the vocabulary.
pub const DEFAULT_COMPLIMENTS: &[&str] = &["You're amazing!"];

pub fn color_for(label: &str) -> Rgb<u8> {
    Emotion::from_label(label).map_or(DEFAULT_COLOR, Emotion::color)
}

pub fn compliments_for(label: &str) -> &'static [&'static str] {
    Emotion::from_label(label).map_or(DEFAULT_COMPLIMENTS, Emotion::compliments)
}

/// Capitalize the first letter of a label for display.
pub fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Per-face emotion confidences, kept in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionScores {
    scores: Vec<(String, f32)>,
}

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, confidence: f32) {
        self.scores.push((label.into(), confidence));
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest-confidence label. Ties keep the first one seen.
    pub fn dominant(&self) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (label, score) in self.iter() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((label, score)),
            }
        }
        best
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        Self {
            scores: iter
                .into_iter()
                .map(|(label, score)| (label.into(), score))
                .collect(),
        }
    }
}
