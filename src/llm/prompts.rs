// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Prompt construction for every LLM-backed step.
//!
//! Pure data templating: the builders take inputs and produce a
//! system/user prompt pair, with no per-request state. Personality voices
//! are table-driven.

use crate::models::conversation::{ConversationContext, ConversationExchange};
use crate::models::news::NewsArticle;
use crate::models::video::Video;
use crate::models::workflow::{ResponseLength, UserPreferences};

/// A system/user prompt pair for one completion call.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// System instructions
    pub system: String,
    /// User content
    pub user: String,
}

/// One personality voice preset.
#[derive(Debug, Clone, Copy)]
pub struct PersonalityTemplate {
    /// Tag carried in user preferences
    pub tag: &'static str,
    /// Voice instructions injected into the stylize prompt
    pub voice: &'static str,
}

/// The six supported personality voices. The first entry is the default.
pub const PERSONALITIES: [PersonalityTemplate; 6] = [
    PersonalityTemplate {
        tag: "friendly-explainer",
        voice: "Warm and approachable. Explain like a knowledgeable friend: plain \
                language, short sentences, a concrete example where it helps. \
                Avoid jargon; when a technical term is unavoidable, unpack it.",
    },
    PersonalityTemplate {
        tag: "professional-anchor",
        voice: "Measured broadcast-news register. Lead with the headline fact, \
                attribute claims to their sources, keep opinion out. Crisp \
                paragraphs, no filler.",
    },
    PersonalityTemplate {
        tag: "witty-companion",
        voice: "Light and playful without losing the facts. A wry aside or two is \
                welcome; sarcasm about real harm is not. Keep jokes short and \
                land the substance first.",
    },
    PersonalityTemplate {
        tag: "data-analyst",
        voice: "Numbers first. Surface figures, percentages, dates and trends from \
                the sources; flag what the data does not show. Bullet the key \
                metrics when there are three or more.",
    },
    PersonalityTemplate {
        tag: "morning-brief",
        voice: "Telegraphic morning-briefing style: what happened, why it matters, \
                what to watch next. Three tight sections, no throat-clearing.",
    },
    PersonalityTemplate {
        tag: "global-correspondent",
        voice: "Worldly and contextual. Situate the story geographically and \
                historically, note how it is playing in different regions, and \
                spell out names and places on first mention.",
    },
];

/// Looks up a personality by tag, falling back to the default voice.
pub fn personality_for(tag: &str) -> &'static PersonalityTemplate {
    PERSONALITIES
        .iter()
        .find(|p| p.tag.eq_ignore_ascii_case(tag.trim()))
        .unwrap_or(&PERSONALITIES[0])
}

fn length_instruction(length: ResponseLength) -> &'static str {
    match length {
        ResponseLength::Brief => "Keep the answer to two or three sentences.",
        ResponseLength::Moderate => "Keep the answer to two short paragraphs.",
        ResponseLength::Detailed => "A thorough answer is fine, up to five paragraphs.",
    }
}

/// Formats exchanges as a numbered history block, oldest first.
fn format_exchanges(exchanges: &[ConversationExchange]) -> String {
    if exchanges.is_empty() {
        return "(no prior conversation)".to_string();
    }
    exchanges
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "[{}] (id: {}) user: {}\n    assistant: {}",
                i + 1,
                e.id,
                e.user_query,
                e.assistant_response
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Intent classification over the recent history.
pub fn classify_intent(query: &str, history: &[ConversationExchange]) -> Prompt {
    Prompt {
        system: "You classify user queries for a conversational news assistant. \
                 Respond with a single JSON object and nothing else:\n\
                 {\"intent\": \"new_news_query\" | \"follow_up_discussion\" | \"chitchat\",\n \
                  \"confidence\": <0..1>,\n \
                  \"reasoning\": \"<one sentence>\",\n \
                  \"enhanced_query\": \"<optional standalone rewrite of the query>\",\n \
                  \"referenced_topic\": \"<topic of the prior exchange, for follow-ups>\",\n \
                  \"referenced_exchange_id\": \"<id of the prior exchange, for follow-ups>\"}\n\
                 Use new_news_query when fresh news retrieval is needed, \
                 follow_up_discussion when the query refers back to an earlier \
                 exchange, chitchat for everything conversational."
            .to_string(),
        user: format!(
            "Recent exchanges:\n{}\n\nCurrent query: {}",
            format_exchanges(history),
            query
        ),
    }
}

/// Fallback two-way classification (news vs chitchat).
pub fn classify_intent_simple(query: &str) -> Prompt {
    Prompt {
        system: "Answer with exactly one word, \"news\" or \"chitchat\": does this \
                 query ask about news or current events?"
            .to_string(),
        user: query.to_string(),
    }
}

/// Query rewrite into compact AND-joined keyword form.
pub fn enhance_query(query: &str, conversation: &ConversationContext) -> Prompt {
    Prompt {
        system: "Rewrite the user's news question as a compact search phrase of 2-3 \
                 keywords suitable for AND-joined retrieval. Respond with the phrase \
                 only, no punctuation, no quotes."
            .to_string(),
        user: format!(
            "Conversation context: {}\n\nQuestion: {}",
            if conversation.context_summary.is_empty() {
                "(none)"
            } else {
                &conversation.context_summary
            },
            query
        ),
    }
}

/// Keyword extraction from the enhanced query.
pub fn extract_keywords(query: &str) -> Prompt {
    Prompt {
        system: "Extract search keywords from the query. Respond with a single JSON \
                 object: {\"keywords\": [\"...\"]}. Between two and six keywords, \
                 lowercase, no duplicates, most important first."
            .to_string(),
        user: query.to_string(),
    }
}

/// Relevance scoring of fresh articles against the query.
pub fn rank_articles(query: &str, candidates: &[NewsArticle]) -> Prompt {
    let listing = candidates
        .iter()
        .map(|a| format!("- id: {}\n  title: {}\n  summary: {}", a.id, a.title, a.description))
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        system: "You judge how relevant news articles are to a query. Respond with a \
                 single JSON object:\n\
                 {\"relevant\": [{\"id\": \"<article id>\", \"score\": <0..1>}]}\n\
                 Include only articles scoring at least 0.6, at most 8 entries, \
                 highest score first. If none reach 0.6, include the best 3."
            .to_string(),
        user: format!("Query: {}\n\nArticles:\n{}", query, listing),
    }
}

/// Relevance scoring of fresh videos against the query.
pub fn rank_videos(query: &str, candidates: &[Video]) -> Prompt {
    let listing = candidates
        .iter()
        .map(|v| {
            format!(
                "- id: {}\n  title: {}\n  channel: {}\n  summary: {}",
                v.id, v.title, v.channel_name, v.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        system: "You judge how relevant videos are to a news query. Respond with a \
                 single JSON object:\n\
                 {\"relevant\": [{\"id\": \"<video id>\", \"score\": <0..1>}]}\n\
                 Include only videos scoring at least 0.6, at most 8 entries, \
                 highest score first. If none reach 0.6, include the best 3."
            .to_string(),
        user: format!("Query: {}\n\nVideos:\n{}", query, listing),
    }
}

/// Query-focused multi-source summary.
pub fn summarize(query: &str, articles: &[NewsArticle], videos: &[Video]) -> Prompt {
    let article_block = articles
        .iter()
        .map(|a| {
            let body = a.content.as_deref().unwrap_or(&a.description);
            format!("### {} ({})\n{}", a.title, a.source, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let video_block = if videos.is_empty() {
        "(none)".to_string()
    } else {
        videos
            .iter()
            .map(|v| {
                let body = v.transcript.as_deref().unwrap_or(&v.description);
                format!("### {} ({})\n{}", v.title, v.channel_name, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    Prompt {
        system: "Write a focused news summary answering the user's question from the \
                 provided sources only. Mention at least one article title \
                 explicitly. If the sources disagree, say so. Do not invent facts."
            .to_string(),
        user: format!(
            "Question: {}\n\n## Articles\n{}\n\n## Video coverage\n{}",
            query, article_block, video_block
        ),
    }
}

/// Personality rewrite of the summary.
pub fn stylize(query: &str, summary: &str, preferences: &UserPreferences) -> Prompt {
    let personality = personality_for(&preferences.personality);
    Prompt {
        system: format!(
            "Rewrite the briefing below in the following voice, keeping every fact \
             and source mention intact.\nVoice: {}\n{}",
            personality.voice,
            length_instruction(preferences.response_length)
        ),
        user: format!("Original question: {}\n\nBriefing:\n{}", query, summary),
    }
}

/// Grounded reply for follow-up discussion.
pub fn contextual_reply(
    query: &str,
    exchanges: &[ConversationExchange],
    referenced_topic: Option<&str>,
    preferences: &UserPreferences,
) -> Prompt {
    let personality = personality_for(&preferences.personality);
    Prompt {
        system: format!(
            "The user is following up on an earlier answer. Reply grounded in the \
             prior exchanges below; do not invent new reporting. Voice: {}\n{}",
            personality.voice,
            length_instruction(preferences.response_length)
        ),
        user: format!(
            "Referenced topic: {}\n\nRecent exchanges:\n{}\n\nFollow-up: {}",
            referenced_topic.unwrap_or("(not identified)"),
            format_exchanges(exchanges),
            query
        ),
    }
}

/// Open-domain chitchat conditioned on conversational memory.
pub fn chitchat_reply(query: &str, conversation: &ConversationContext) -> Prompt {
    let history = format_exchanges(conversation.recent_exchanges(5));
    let topics = if conversation.current_topics.is_empty() {
        "(none)".to_string()
    } else {
        conversation.current_topics.join(", ")
    };
    Prompt {
        system: "You are a friendly news assistant making conversation. Use the \
                 conversation history: when the user asks about something they told \
                 you earlier (their name, a preference, a fact), repeat it back \
                 exactly. Keep the reply short."
            .to_string(),
        user: format!(
            "Topics discussed: {}\n\nHistory:\n{}\n\nUser says: {}",
            topics, history, query
        ),
    }
}

/// Short fallback summary for a video with no usable captions.
pub fn video_fallback_summary(video: &Video) -> Prompt {
    Prompt {
        system: "Write a two-sentence factual summary of what this video most likely \
                 covers, based only on its title and description."
            .to_string(),
        user: format!("Title: {}\nDescription: {}", video.title, video.description),
    }
}
