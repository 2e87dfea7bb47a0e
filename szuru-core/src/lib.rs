mod client;
mod dry_run;

pub use client::{
    DRY_RUN_POST_ID, PostRef, ReverseSearch, Safety, SimilarPost, SzuruClient, SzuruError,
};
pub use dry_run::DryRun;
