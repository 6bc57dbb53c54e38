// Scoring — engagement ranking for posts.

pub mod engagement;
