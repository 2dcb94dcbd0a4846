//! Clone drivers: Smart HTTP and the local filesystem.

use std::collections::BTreeSet;
use std::path::Path;

use wit_hash::ObjectId;
use wit_ref::RefName;
use wit_repository::{InitOptions, Repository};
use wit_transport::{http_get, http_post, CancelFlag, WitUrl};

use crate::advert::parse_advertisement;
use crate::fetch::{build_upload_pack_request, read_pack_response};
use crate::pktline::PktLineReader;
use crate::ProtocolError;

const UPLOAD_PACK_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";

/// Options for [`http_clone`].
#[derive(Debug, Default)]
pub struct CloneOptions {
    /// Abort the in-flight transfer when raised.
    pub cancel: Option<CancelFlag>,
    /// `deepen <n>` in the negotiation.
    pub depth: Option<u32>,
}

/// Clone a Smart HTTP remote into `dest`.
///
/// Advertise, want every branch tip, fetch one pack, import it, write the
/// refs, and check out the remote's HEAD branch.
pub fn http_clone(
    url: &str,
    dest: &Path,
    opts: &CloneOptions,
) -> Result<Repository, ProtocolError> {
    let url = WitUrl::parse(url)?;
    let auth = url.basic_auth();
    let cancel = opts.cancel.as_ref();

    let advert_body = http_get(
        &url.info_refs_url("git-upload-pack"),
        auth.as_deref(),
        cancel,
    )?;
    let advert = parse_advertisement(&mut PktLineReader::new(&advert_body[..]))?;

    let default_branch = advert
        .head_symref
        .clone()
        .or_else(|| {
            let branches = advert.branches();
            branches
                .iter()
                .find(|(name, _)| name == "main")
                .or_else(|| branches.first())
                .map(|(name, _)| name.clone())
        })
        .unwrap_or_else(|| "main".to_string());

    let repo = Repository::init_opts(
        dest,
        &InitOptions {
            default_branch: Some(default_branch.clone()),
            ..Default::default()
        },
    )?;

    // Want every branch tip (deduplicated; tags ride along via the pack).
    let wants: BTreeSet<ObjectId> = advert.branches().iter().map(|(_, id)| *id).collect();
    if wants.is_empty() {
        // Cloning an empty repository: nothing to fetch.
        return Ok(repo);
    }
    let wants: Vec<ObjectId> = wants.into_iter().collect();

    let request = build_upload_pack_request(&wants, opts.depth)?;
    let response = http_post(
        &url.upload_pack_url(),
        UPLOAD_PACK_CONTENT_TYPE,
        &request,
        auth.as_deref(),
        cancel,
    )?;
    let pack = read_pack_response(&mut PktLineReader::new(&response[..]))?;
    repo.objects().import_pack(&pack)?;

    write_refs(&repo, &advert.branches(), &advert.tags())?;

    // Attach HEAD and materialize the work tree.
    let head_branch = RefName::branch(&default_branch)?;
    repo.refs().set_head_symbolic(&head_branch)?;
    if let Some(tip) = repo.refs().resolve(&head_branch)? {
        repo.reset_worktree_to(Some(tip))?;
    }
    Ok(repo)
}

/// Clone another repository on this filesystem.
pub fn local_clone(src: &Path, dest: &Path) -> Result<Repository, ProtocolError> {
    let src_repo = Repository::discover(src)?;
    let dest_repo = Repository::init_opts(
        dest,
        &InitOptions {
            algorithm: src_repo.algorithm(),
            default_branch: Some(src_repo.config().default_branch()),
        },
    )?;

    // Objects: everything the source has, byte for byte.
    for id in src_repo.objects().enumerate()? {
        let (obj_type, body) = src_repo.objects().read_raw(&id)?;
        dest_repo.objects().write_raw(obj_type, &body)?;
    }

    let mut branches = Vec::new();
    for name in src_repo.refs().list_branches()? {
        if let Some(id) = src_repo.refs().resolve(&name)? {
            branches.push((name.shorten().to_string(), id));
        }
    }
    let mut tags = Vec::new();
    for name in src_repo.refs().list_tags()? {
        if let Some(id) = src_repo.refs().resolve(&name)? {
            tags.push((name.shorten().to_string(), id));
        }
    }
    write_refs(&dest_repo, &branches, &tags)?;

    // Same checked-out branch as the source, when it exists.
    let head_branch = src_repo
        .refs()
        .current_branch()?
        .unwrap_or_else(|| src_repo.config().default_branch());
    let head_ref = RefName::branch(&head_branch)?;
    dest_repo.refs().set_head_symbolic(&head_ref)?;
    if let Some(tip) = dest_repo.refs().resolve(&head_ref)? {
        dest_repo.reset_worktree_to(Some(tip))?;
    }
    Ok(dest_repo)
}

fn write_refs(
    repo: &Repository,
    branches: &[(String, ObjectId)],
    tags: &[(String, ObjectId)],
) -> Result<(), ProtocolError> {
    for (name, id) in branches {
        repo.refs().update(&RefName::branch(name)?, *id)?;
    }
    for (name, id) in tags {
        if repo.objects().has(id) {
            repo.refs().update(&RefName::tag(name)?, *id)?;
        }
    }
    Ok(())
}
