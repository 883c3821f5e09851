//! Site-wide render payload.
//!
//! One snapshot is computed per build or rebuild call and shared by every
//! entity rendered in that call, so a whole batch sees consistent data.
//! Category and tag groupings are recomputed from the post collection on
//! each snapshot rather than trusted from the incremental indices.

use crate::config::SiteConfig;
use crate::model::{Post, Site};
use chrono::Local;
use serde_json::{Map, Value, json};

/// Assemble the `site` payload object.
pub fn site_payload(site: &Site, config: &SiteConfig) -> Value {
    let posts: Vec<Value> = site.posts.iter().map(Post::to_json).collect();

    json!({
        "site": {
            "time": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "title": config.site.title,
            "author": config.site.author,
            "url": config.site.url,
            "posts": posts,
            "categories": post_attr_hash(site, |p| &p.categories),
            "tags": post_attr_hash(site, |p| &p.tags),
        }
    })
}

/// Group post metadata by an attribute, preserving the sorted post order
/// within each group.
fn post_attr_hash<'a, F>(site: &'a Site, attr: F) -> Value
where
    F: Fn(&'a Post) -> &'a Vec<String>,
{
    let mut groups: Map<String, Value> = Map::new();
    for post in &site.posts {
        for key in attr(post) {
            let entry = groups
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.push(post.to_json());
            }
        }
    }
    Value::Object(groups)
}

// ============================================================================
// Tests
// ============================================================================
