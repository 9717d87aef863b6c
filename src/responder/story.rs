//! Branching interactive story
//!
//! The responder keeps no state of its own: the position in the story is
//! rebuilt from the user turns of the transcript on every call.

use super::{Responder, ResponderError, ResponderErrorKind};
use crate::state_machine::{Sender, Turn};
use async_trait::async_trait;
use std::fmt::Write;

const CHOICE_PROMPT: &str = "Que doit faire notre héros ?";
const NOT_UNDERSTOOD: &str = "Je n'ai pas compris ton choix. Réponds avec le numéro de ton choix !";
const THE_END: &str = "Fin ! Écris ce que tu veux pour recommencer l'histoire.";

/// One choice offered at the end of a story node
#[derive(Debug)]
pub struct StoryChoice {
    pub label: &'static str,
    pub next: &'static str,
}

/// A passage of the story; a node without choices is an ending
#[derive(Debug)]
pub struct StoryNode {
    pub id: &'static str,
    pub text: &'static str,
    pub choices: &'static [StoryChoice],
}

const EXPLORE_OR_HOME_FROM_GARDEN: &[StoryChoice] = &[
    StoryChoice {
        label: "Explorer le nouvel endroit",
        next: "garden_explore",
    },
    StoryChoice {
        label: "Revenir à la maison pour raconter cette découverte",
        next: "home",
    },
];

const EXPLORE_OR_HOME_FROM_FOREST: &[StoryChoice] = &[
    StoryChoice {
        label: "Explorer le nouvel endroit",
        next: "forest_explore",
    },
    StoryChoice {
        label: "Revenir à la maison pour raconter cette découverte",
        next: "home",
    },
];

/// The little robot and the magic door
pub const ROBOT_STORY: &[StoryNode] = &[
    StoryNode {
        id: "intro",
        text: "Il était une fois un petit robot curieux qui voulait explorer le monde. Un jour, il découvrit une porte magique qui brillait de mille feux. Il hésita un moment, ne sachant pas ce qui l'attendait de l'autre côté.",
        choices: &[
            StoryChoice {
                label: "Le robot décide d'ouvrir la porte",
                next: "garden",
            },
            StoryChoice {
                label: "Le robot cherche d'abord un ami pour l'accompagner",
                next: "forest",
            },
        ],
    },
    StoryNode {
        id: "garden",
        text: "Le petit robot rassembla tout son courage et ouvrit lentement la porte. Une lumière aveuglante l'enveloppa, et quand il put voir à nouveau, il se trouvait dans un magnifique jardin rempli de fleurs multicolores et d'étranges créatures amicales qui l'invitèrent à jouer.",
        choices: EXPLORE_OR_HOME_FROM_GARDEN,
    },
    StoryNode {
        id: "forest",
        text: "Le petit robot décida qu'il serait plus sage de ne pas y aller seul. Il trouva son ami, un petit oiseau mécanique, et ensemble, ils ouvrirent la porte. Ils se retrouvèrent dans une forêt enchantée où les arbres chantaient doucement et où des papillons lumineux volaient autour d'eux.",
        choices: EXPLORE_OR_HOME_FROM_FOREST,
    },
    StoryNode {
        id: "garden_explore",
        text: "Le robot suivit les créatures jusqu'à une fontaine qui parlait. Elle lui apprit que chaque fleur du jardin avait le nom d'une étoile. Le robot promit de revenir les compter toutes.",
        choices: &[],
    },
    StoryNode {
        id: "forest_explore",
        text: "Guidés par les papillons, le robot et l'oiseau découvrirent un vieil arbre qui connaissait toutes les chansons du monde. Ils passèrent la nuit à chanter avec lui sous la lune.",
        choices: &[],
    },
    StoryNode {
        id: "home",
        text: "Le robot rentra à la maison et raconta son aventure à tous ses amis. Le lendemain, ils décidèrent de franchir la porte magique tous ensemble !",
        choices: &[],
    },
];

/// Where a user turn leaves the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    node: &'static str,
    /// False when the turn did not select a valid choice
    understood: bool,
}

/// Story responder over a static story graph
pub struct StoryResponder {
    nodes: &'static [StoryNode],
    start: &'static str,
}

impl StoryResponder {
    pub fn new(nodes: &'static [StoryNode], start: &'static str) -> Self {
        Self { nodes, start }
    }

    pub fn robot() -> Self {
        Self::new(ROBOT_STORY, "intro")
    }

    fn node(&self, id: &str) -> Result<&'static StoryNode, ResponderError> {
        self.nodes.iter().find(|n| n.id == id).ok_or_else(|| {
            ResponderError::new(
                ResponderErrorKind::Unavailable,
                format!("story node `{id}` does not exist"),
            )
        })
    }

    /// Apply one user turn to the current position
    fn advance(
        &self,
        position: Option<Position>,
        text: &str,
    ) -> Result<Position, ResponderError> {
        let Some(position) = position else {
            return Ok(Position {
                node: self.start,
                understood: true,
            });
        };

        let node = self.node(position.node)?;
        if node.choices.is_empty() {
            // After an ending, any turn starts over
            return Ok(Position {
                node: self.start,
                understood: true,
            });
        }

        Ok(match pick_choice(node.choices, text) {
            Some(choice) => Position {
                node: choice.next,
                understood: true,
            },
            None => Position {
                node: position.node,
                understood: false,
            },
        })
    }

    fn render(&self, position: Position) -> Result<String, ResponderError> {
        let node = self.node(position.node)?;
        let mut out = String::new();

        if position.understood {
            out.push_str(node.text);
        } else {
            out.push_str(NOT_UNDERSTOOD);
        }

        if node.choices.is_empty() {
            let _ = write!(out, "\n\n{THE_END}");
        } else {
            let _ = write!(out, "\n\n{CHOICE_PROMPT}");
            for (i, choice) in node.choices.iter().enumerate() {
                let _ = write!(out, "\n{}. {}", i + 1, choice.label);
            }
        }

        Ok(out)
    }
}

/// Select a choice by number, by label, or by a unique fragment of a label
fn pick_choice<'a>(choices: &'a [StoryChoice], text: &str) -> Option<&'a StoryChoice> {
    let text = text.trim().trim_end_matches(['.', '!', ')']).to_lowercase();

    if let Ok(n) = text.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| choices.get(i));
    }

    if let Some(choice) = choices.iter().find(|c| c.label.to_lowercase() == text) {
        return Some(choice);
    }

    if text.chars().count() < 3 {
        return None;
    }
    let mut matching = choices
        .iter()
        .filter(|c| c.label.to_lowercase().contains(&text));
    match (matching.next(), matching.next()) {
        (Some(choice), None) => Some(choice),
        _ => None,
    }
}

#[async_trait]
impl Responder for StoryResponder {
    async fn respond(&self, input: &str, transcript: &[Turn]) -> Result<String, ResponderError> {
        // The transcript normally ends with the turn being answered
        let history = match transcript.split_last() {
            Some((last, rest)) if last.sender == Sender::User && last.text == input => rest,
            _ => transcript,
        };

        let mut position = None;
        for turn in history.iter().filter(|t| t.sender == Sender::User) {
            position = Some(self.advance(position, &turn.text)?);
        }

        let position = self.advance(position, input)?;
        self.render(position)
    }

    fn name(&self) -> &str {
        "story"
    }
}
