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

//! Data models shared across the pipeline, the stores and the HTTP surface.

pub mod conversation;
pub mod news;
pub mod progress;
pub mod video;
pub mod workflow;

pub use conversation::{ConversationContext, ConversationExchange};
pub use news::{article_id, NewsArticle};
pub use progress::{AgentStatus, AgentUpdate, UpdateType};
pub use video::Video;
pub use workflow::{
    Intent, ProcessingStats, ResponseLength, StageRecord, UserPreferences, WorkflowContext,
    WorkflowRequest, WorkflowResponse, WorkflowStatus,
};
