pub(crate) mod deps;
mod export;
pub(crate) mod router;

pub(crate) use deps::{
    CreateBatchesHttpApiControllerDeps, CreateFilesHttpApiControllerDeps, HttpApiDeps,
};
