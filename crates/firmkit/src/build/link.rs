// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The link stage: sketch objects + library objects + variant objects +
//! core archive into the final image.

use std::path::{Path, PathBuf};

use crate::properties::PropertyMap;
use crate::{Error, Result};

use super::exec::{expand_recipe, run_command};
use super::BuildSession;

pub async fn link(
    session: &BuildSession,
    properties: &PropertyMap,
    sketch_objects: &[PathBuf],
    library_objects: &[PathBuf],
    core_objects: &[PathBuf],
    core_archive: &Path,
) -> Result<()> {
    if session.only_update_compilation_database {
        return Ok(());
    }

    let object_files: Vec<&PathBuf> = sketch_objects
        .iter()
        .chain(library_objects)
        .chain(core_objects)
        .collect();
    let object_files = object_files
        .iter()
        .map(|p| format!("{:?}", p.display().to_string()))
        .collect::<Vec<_>>()
        .join(" ");

    let mut props = properties.clone();
    props.set("object_files", object_files);
    props.set(
        "archive_file",
        core_archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    props.set("archive_file_path", core_archive.display().to_string());

    let argv = expand_recipe(&props, "recipe.c.combine.pattern")?;
    run_command(&argv, &session.sinks, session.verbose)
        .await
        .map_err(|err| Error::Link {
            source: Box::new(err),
        })
}
