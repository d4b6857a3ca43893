// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The core compile phase.
//!
//! Core sources are compiled and archived into `core.a`; variant sources
//! become plain objects handed to the linker. The archive can be cached
//! across builds keyed by the core's identity, since the core never depends
//! on the sketch.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::properties::PropertyMap;
use crate::{Error, Result};

use super::compile::{compile_files, gather_source_files};
use super::exec::{expand_recipe, run_command};
use super::BuildSession;

pub const CORE_ARCHIVE_NAME: &str = "core.a";

/// Compile the core and variant. Returns the variant objects and the core
/// archive path.
pub async fn compile_core(
    session: &BuildSession,
    includes: &[PathBuf],
    properties: &PropertyMap,
) -> Result<(Vec<PathBuf>, PathBuf)> {
    let core_path = properties
        .get("build.core.path")
        .map(PathBuf::from)
        .ok_or_else(|| Error::NotFound {
            kind: "property",
            name: "build.core.path".to_string(),
        })?;
    if !core_path.is_dir() {
        return Err(Error::NotADirectory(core_path));
    }
    let variant_path = properties
        .get("build.variant.path")
        .map(PathBuf::from)
        .filter(|p| p.is_dir());

    let core_build_path = session.core_build_path();

    // Variant objects always build into the core directory but are not
    // archived
    let mut variant_objects = Vec::new();
    if let Some(variant) = &variant_path {
        let sources = gather_source_files(variant)?;
        variant_objects =
            compile_files(session, &sources, variant, &core_build_path, includes, properties)
                .await?;
    }

    // A fresh cached archive short-circuits the whole core compile
    let cached_archive = session
        .core_build_cache_path
        .as_ref()
        .map(|cache| cache.join(core_identity(&core_path, properties)).join(CORE_ARCHIVE_NAME));
    let core_sources = gather_source_files(&core_path)?;
    if !session.clean {
        if let Some(cached) = &cached_archive {
            if archive_is_fresh(cached, &core_sources) {
                session.sinks.info(&format!(
                    "Using precompiled core: {}",
                    cached.display()
                ));
                return Ok((variant_objects, cached.clone()));
            }
        }
    }

    let core_objects = compile_files(
        session,
        &core_sources,
        &core_path,
        &core_build_path,
        includes,
        properties,
    )
    .await?;

    let archive = core_build_path.join(CORE_ARCHIVE_NAME);
    archive_objects(session, properties, &archive, &core_objects).await?;

    // Publish to the shared cache with an atomic rename so concurrent
    // builds never observe a partial archive
    if let Some(cached) = &cached_archive {
        if !session.only_update_compilation_database {
            if let Err(err) = publish_archive(&archive, cached) {
                session
                    .sinks
                    .warn(&format!("Could not cache built core: {err}"));
            }
        }
    }

    Ok((variant_objects, archive))
}

/// Run `recipe.ar.pattern` once per object, appending to the archive.
async fn archive_objects(
    session: &BuildSession,
    properties: &PropertyMap,
    archive: &Path,
    objects: &[PathBuf],
) -> Result<()> {
    if session.only_update_compilation_database {
        return Ok(());
    }
    if archive.exists() {
        std::fs::remove_file(archive)?;
    }
    for object in objects {
        session.check_cancelled()?;
        let mut props = properties.clone();
        props.set(
            "archive_file",
            archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        props.set("archive_file_path", archive.display().to_string());
        props.set("object_file", object.display().to_string());
        let argv = expand_recipe(&props, "recipe.ar.pattern")?;
        run_command(&argv, &session.sinks, session.verbose).await?;
    }
    Ok(())
}

/// Cache key for a built core: where it lives plus the flags that shape it.
fn core_identity(core_path: &Path, properties: &PropertyMap) -> String {
    let mut hasher = Sha256::new();
    hasher.update(core_path.display().to_string());
    hasher.update("\0");
    hasher.update(properties.get("build.fqbn").unwrap_or(""));
    hasher.update("\0");
    hasher.update(properties.get("compiler.optimization_flags").unwrap_or(""));
    let digest = hasher.finalize();
    format!("core_{:x}", digest)[..37].to_string()
}

/// A cached archive is fresh when it is newer than every core source.
fn archive_is_fresh(archive: &Path, core_sources: &[PathBuf]) -> bool {
    let Ok(archive_mtime) = std::fs::metadata(archive).and_then(|m| m.modified()) else {
        return false;
    };
    core_sources.iter().all(|source| {
        std::fs::metadata(source)
            .and_then(|m| m.modified())
            .is_ok_and(|mtime| mtime <= archive_mtime)
    })
}

fn publish_archive(archive: &Path, cached: &Path) -> Result<()> {
    let cache_dir = cached.parent().expect("cached archive has a parent");
    std::fs::create_dir_all(cache_dir)?;
    let staging = cached.with_extension("a.tmp");
    std::fs::copy(archive, &staging)?;
    std::fs::rename(&staging, cached)?;
    debug!("Archived built core: {}", cached.display());
    Ok(())
}
