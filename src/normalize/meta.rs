//! Avatar meta: 0.x usage/license names to 1.0 permission fields and back.

use crate::document::Document;
use crate::validate::IssueReport;
use crate::vrm::vrm0::Vrm0Meta;
use crate::vrm::vrm1::{Meta, VRM_LICENSE_URL};

use super::migration_loss;

const POINTER: &str = "/extensions/VRM/meta";
const UNKNOWN: &str = "unknown";

fn allowed(value: Option<&str>) -> bool {
    value == Some("Allow")
}

fn allow_name(allowed: bool) -> Option<String> {
    Some(if allowed { "Allow" } else { "Disallow" }.to_string())
}

/// Apply a 0.x `licenseName` to the 1.0 redistribution, credit, modification
/// and commercial fields.
fn apply_license(
    meta: &mut Meta,
    license: &str,
    other_url: Option<&str>,
    report: &mut IssueReport,
) {
    match license {
        "Redistribution_Prohibited" => meta.allow_redistribution = false,
        "CC0" => {
            meta.allow_redistribution = true;
            meta.credit_notation = "unnecessary".to_string();
            meta.modification = "allowModificationRedistribution".to_string();
        }
        license if license.starts_with("CC_BY") => {
            meta.allow_redistribution = true;
            meta.credit_notation = "required".to_string();
            meta.modification = if license.contains("_ND") {
                "prohibited"
            } else {
                "allowModificationRedistribution"
            }
            .to_string();
            if license.contains("_NC") {
                meta.commercial_usage = "personalNonProfit".to_string();
            }
        }
        "Other" => {
            meta.other_license_url = other_url.map(str::to_string);
        }
        other => migration_loss(
            report,
            format!("{POINTER}/licenseName"),
            format!("license '{other}' has no 1.0 equivalent"),
        ),
    }
    if license != "Other" && other_url.is_some() {
        meta.other_license_url = other_url.map(str::to_string);
    }
}

pub(super) fn meta_from_vrm0(
    source: &Vrm0Meta,
    document: &Document,
    report: &mut IssueReport,
) -> Meta {
    let mut meta = Meta::default();

    meta.name = match &source.title {
        Some(title) if !title.is_empty() => title.clone(),
        _ => {
            migration_loss(report, format!("{POINTER}/title"), "avatar has no title");
            UNKNOWN.to_string()
        }
    };
    meta.authors = match &source.author {
        Some(author) if !author.is_empty() => vec![author.clone()],
        _ => {
            migration_loss(report, format!("{POINTER}/author"), "avatar has no author");
            vec![UNKNOWN.to_string()]
        }
    };
    meta.version = source.version.clone();
    meta.contact_information = source.contact_information.clone();
    meta.references = source.reference.iter().cloned().collect();

    if let Some(texture) = source.texture {
        meta.thumbnail_image = document.textures.get(texture).and_then(|texture| texture.source);
        if meta.thumbnail_image.is_none() {
            migration_loss(
                report,
                format!("{POINTER}/texture"),
                format!("thumbnail texture {texture} has no image"),
            );
        }
    }

    meta.avatar_permission = match source.allowed_user_name.as_deref() {
        Some("Everyone") => "everyone",
        Some("ExplicitlyLicensedPerson") => "onlySeparatelyLicensedPerson",
        _ => "onlyAuthor",
    }
    .to_string();
    meta.allow_excessively_violent_usage = allowed(source.violent_ussage_name.as_deref());
    meta.allow_excessively_sexual_usage = allowed(source.sexual_ussage_name.as_deref());
    meta.commercial_usage = if allowed(source.commercial_ussage_name.as_deref()) {
        "corporation"
    } else {
        "personalNonProfit"
    }
    .to_string();
    if source.other_permission_url.is_some() {
        migration_loss(
            report,
            format!("{POINTER}/otherPermissionUrl"),
            "other permission URL has no 1.0 field",
        );
    }

    meta.license_url = VRM_LICENSE_URL.to_string();
    if let Some(license) = &source.license_name {
        apply_license(&mut meta, license, source.other_license_url.as_deref(), report);
    }
    meta
}

fn license_name(meta: &Meta) -> &'static str {
    if meta.other_license_url.is_some() {
        "Other"
    } else if !meta.allow_redistribution {
        "Redistribution_Prohibited"
    } else if meta.credit_notation == "unnecessary" {
        "CC0"
    } else {
        match (
            meta.commercial_usage == "personalNonProfit",
            meta.modification == "prohibited",
        ) {
            (false, false) => "CC_BY",
            (true, false) => "CC_BY_NC",
            (false, true) => "CC_BY_ND",
            (true, true) => "CC_BY_NC_ND",
        }
    }
}

pub(super) fn meta_to_vrm0(meta: &Meta, document: &Document, report: &mut IssueReport) -> Vrm0Meta {
    let texture = meta.thumbnail_image.and_then(|image| {
        let texture = document
            .textures
            .iter()
            .position(|texture| texture.source == Some(image));
        if texture.is_none() {
            migration_loss(
                report,
                "/extensions/VRMC_vrm/meta/thumbnailImage",
                format!("no texture samples thumbnail image {image}"),
            );
        }
        texture
    });
    if meta.references.len() > 1 {
        migration_loss(
            report,
            "/extensions/VRMC_vrm/meta/references",
            "only the first reference is kept",
        );
    }

    Vrm0Meta {
        title: Some(meta.name.clone()),
        version: meta.version.clone(),
        author: Some(meta.authors.join(", ")),
        contact_information: meta.contact_information.clone(),
        reference: meta.references.first().cloned(),
        texture,
        allowed_user_name: Some(
            match meta.avatar_permission.as_str() {
                "everyone" => "Everyone",
                "onlySeparatelyLicensedPerson" => "ExplicitlyLicensedPerson",
                _ => "OnlyAuthor",
            }
            .to_string(),
        ),
        violent_ussage_name: allow_name(meta.allow_excessively_violent_usage),
        sexual_ussage_name: allow_name(meta.allow_excessively_sexual_usage),
        commercial_ussage_name: allow_name(meta.commercial_usage != "personalNonProfit"),
        other_permission_url: None,
        license_name: Some(license_name(meta).to_string()),
        other_license_url: meta.other_license_url.clone(),
    }
}
