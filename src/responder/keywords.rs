//! Offline keyword-matching responder

use super::{Responder, ResponderError};
use crate::state_machine::Turn;
use async_trait::async_trait;

const DEFAULT_REPLY: &str = "C'est une question intéressante ! J'apprends encore beaucoup de choses. Peux-tu me demander autre chose ?";

/// A rule matches when every group has at least one keyword in the input
#[derive(Debug, Clone)]
pub struct KeywordRule {
    groups: Vec<Vec<String>>,
    reply: String,
}

impl KeywordRule {
    pub fn new<G, K>(groups: G, reply: impl Into<String>) -> Self
    where
        G: IntoIterator<Item = K>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            groups: groups
                .into_iter()
                .map(|g| g.into_iter().map(|k| k.into().to_lowercase()).collect())
                .collect(),
            reply: reply.into(),
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|keyword| lowered.contains(keyword.as_str())))
    }
}

/// Ordered rule table; the first matching rule wins
pub struct KeywordResponder {
    rules: Vec<KeywordRule>,
    default_reply: String,
}

impl KeywordResponder {
    pub fn new(rules: Vec<KeywordRule>, default_reply: impl Into<String>) -> Self {
        Self {
            rules,
            default_reply: default_reply.into(),
        }
    }

    /// The science questions answered by the voice assistant
    pub fn educational() -> Self {
        Self::new(
            vec![
                KeywordRule::new(
                    [vec!["ciel"], vec!["bleu"]],
                    "Le ciel est bleu parce que la lumière du soleil est composée de toutes les couleurs, mais l'air diffuse davantage la couleur bleue que les autres couleurs. C'est un peu comme si l'air jouait à attraper les rayons bleus !",
                ),
                KeywordRule::new(
                    [vec!["bébé"], vec!["grenouille"]],
                    "Les bébés grenouilles s'appellent des têtards ! Ils ressemblent à de petits poissons avec une grosse tête et une queue. Puis ils se transforment peu à peu en grenouilles !",
                ),
                KeywordRule::new(
                    [vec!["planète"], vec!["grande", "grosse"]],
                    "La plus grande planète de notre système solaire est Jupiter ! Elle est tellement immense qu'on pourrait y faire tenir plus de 1300 Terres !",
                ),
                KeywordRule::new(
                    [vec!["dinosaure"]],
                    "Les dinosaures sont fascinants ! Ils ont vécu il y a très longtemps, certains étaient énormes comme le Diplodocus, d'autres féroces comme le T-Rex. Quel est ton dinosaure préféré ?",
                ),
            ],
            DEFAULT_REPLY,
        )
    }

    fn reply_for(&self, input: &str) -> &str {
        let lowered = input.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map_or(self.default_reply.as_str(), |rule| rule.reply.as_str())
    }
}

#[async_trait]
impl Responder for KeywordResponder {
    async fn respond(&self, input: &str, _transcript: &[Turn]) -> Result<String, ResponderError> {
        Ok(self.reply_for(input).to_string())
    }

    fn name(&self) -> &str {
        "keywords"
    }
}
