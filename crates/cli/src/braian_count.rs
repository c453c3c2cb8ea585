//! braian-count - count the detections of a saved object hierarchy
//!
//! Loads a scene (image size and objects, parents first), groups the
//! detections of each channel, applies the configured classifiers,
//! optionally computes the overlaps with a control channel and prints a
//! JSON summary of every group.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use braian_core::classify::{ClassifierScope, PartialClassifier};
use braian_core::hierarchy::ObjectKind;
use braian_core::params::ChannelConfig;
use braian_core::{
    ContainerKind, DEFAULT_MAX_DEPTH, DetectionGroup, GroupParams, Label, MemoryHierarchy,
    ObjectClassifier, ObjectHierarchy, ObjectId, PathObject, ProjectConfig, Roi, SingleClassifier,
    ThresholdClassifier,
};
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;

/// Count cell detections per container annotation.
#[derive(Parser, Debug)]
#[command(name = "braian-count")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene JSON with the image size and its objects
    scene: PathBuf,

    /// Project configuration (JSON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Channels to count; defaults to the channels of the configuration
    #[arg(long = "channel", value_name = "NAME")]
    channels: Vec<String>,

    /// Maximum depth of the spatial indices
    #[arg(long = "max-depth", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Pretty-print the output
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
}

// === Scene ===

#[derive(Debug, Deserialize)]
struct Scene {
    width: f64,
    height: f64,
    #[serde(default)]
    objects: Vec<SceneObject>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SceneKind {
    Annotation,
    Detection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SceneRoi {
    /// `[x, y, width, height]`
    Rectangle([f64; 4]),
    Polygon(Vec<[f64; 2]>),
    Points(Vec<[f64; 2]>),
}

#[derive(Debug, Deserialize)]
struct SceneObject {
    kind: SceneKind,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    roi: SceneRoi,
    /// Index of the parent in `objects`; the root when absent.
    #[serde(default)]
    parent: Option<usize>,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    measurements: BTreeMap<String, f64>,
}

impl SceneRoi {
    fn into_roi(self) -> Roi {
        let points = |ps: Vec<[f64; 2]>| -> Vec<(f64, f64)> {
            ps.into_iter().map(|[x, y]| (x, y)).collect()
        };
        match self {
            Self::Rectangle([x, y, w, h]) => Roi::rectangle(x, y, w, h),
            Self::Polygon(ps) => Roi::polygon(points(ps)),
            Self::Points(ps) => Roi::points(points(ps)),
        }
    }
}

impl SceneObject {
    fn into_object(self) -> PathObject {
        let kind = match self.kind {
            SceneKind::Annotation => ObjectKind::Annotation,
            SceneKind::Detection => ObjectKind::Detection,
        };
        let mut object = PathObject::new(kind, self.roi.into_roi()).locked(self.locked);
        object.name = self.name;
        object.label = self.label.map(Label::from);
        for (name, value) in self.measurements {
            object = object.with_measurement(name, value);
        }
        object
    }
}

fn load_scene(path: &Path) -> Result<MemoryHierarchy> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let scene: Scene = serde_json::from_str(&data)
        .with_context(|| format!("invalid scene {}", path.display()))?;

    let mut hierarchy = MemoryHierarchy::new(scene.width, scene.height);
    let mut ids: Vec<ObjectId> = Vec::with_capacity(scene.objects.len());
    for (i, object) in scene.objects.into_iter().enumerate() {
        let parent = match object.parent {
            None => hierarchy.root(),
            Some(p) if p < i => ids[p],
            Some(p) => bail!("object {i} has parent {p}, which does not precede it"),
        };
        let id = hierarchy
            .add_object(parent, object.into_object())
            .with_context(|| format!("cannot add object {i}"))?;
        ids.push(id);
    }
    debug!(objects = ids.len(), "scene loaded");
    Ok(hierarchy)
}

fn load_config(path: Option<&Path>) -> Result<ProjectConfig> {
    let Some(path) = path else {
        return Ok(ProjectConfig::default());
    };
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid configuration {}", path.display()))
}

// === Classification ===

fn build_classifiers(channel: &ChannelConfig) -> Result<Vec<Box<dyn ObjectClassifier>>> {
    channel
        .classifiers
        .iter()
        .map(|config| -> Result<Box<dyn ObjectClassifier>> {
            if config.is_single() {
                return Ok(Box::new(SingleClassifier::new(channel.name.as_str())));
            }
            match (&config.measurement, config.threshold) {
                (Some(measurement), Some(threshold)) => Ok(Box::new(ThresholdClassifier::new(
                    measurement.as_str(),
                    threshold,
                    channel.name.as_str(),
                    Label::discarded(&channel.name),
                ))),
                _ => bail!(
                    "classifier '{}' of channel '{}' is neither ALL nor a measurement threshold",
                    config.name,
                    channel.name
                ),
            }
        })
        .collect()
}

fn classify(
    hierarchy: &mut MemoryHierarchy,
    group: &mut DetectionGroup,
    channel: &ChannelConfig,
) -> Result<()> {
    let classifiers = build_classifiers(channel)?;
    if classifiers.is_empty() {
        return Ok(());
    }
    let scopes: Vec<ClassifierScope> = channel
        .classifiers
        .iter()
        .map(|config| config.scope(&*hierarchy))
        .collect();
    let steps: Vec<PartialClassifier<'_>> = classifiers
        .iter()
        .zip(scopes)
        .map(|(classifier, scope)| PartialClassifier::new(classifier.as_ref(), scope))
        .collect();

    let report = group
        .apply_classifiers(hierarchy, &steps)
        .with_context(|| format!("failed to classify '{}'", channel.name))?;
    if let Some(aborted) = &report.aborted {
        warn!(channel = %channel.name, "classification stopped early: {aborted}");
    }
    info!(
        channel = %channel.name,
        steps = report.steps_applied,
        detections = report.detections,
        "classified"
    );
    Ok(())
}

// === Output ===

#[derive(Debug, Serialize)]
struct ContainerSummary {
    parent: Option<String>,
    name: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct GroupSummary {
    id: String,
    kind: &'static str,
    total: usize,
    containers: Vec<ContainerSummary>,
}

fn describe(hierarchy: &MemoryHierarchy, id: ObjectId) -> String {
    hierarchy
        .get(id)
        .and_then(|o| o.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn summarize(hierarchy: &MemoryHierarchy, group: &DetectionGroup) -> GroupSummary {
    let containers = group
        .containers()
        .iter()
        .map(|&c| ContainerSummary {
            parent: hierarchy.parent(c).map(|p| describe(hierarchy, p)),
            name: describe(hierarchy, c),
            count: group
                .iter()
                .filter(|d| hierarchy.parent(d.id) == Some(c))
                .count(),
        })
        .collect();
    GroupSummary {
        id: group.id().to_string(),
        kind: match group.kind() {
            ContainerKind::Cells => "cells",
            ContainerKind::Overlaps => "overlaps",
        },
        total: group.len(),
        containers,
    }
}

fn run(args: &Args) -> Result<Vec<GroupSummary>> {
    let mut hierarchy = load_scene(&args.scene)?;
    let config = load_config(args.config.as_deref())?;
    let params = GroupParams {
        max_depth: args.max_depth,
    };

    let channels: Vec<String> = if args.channels.is_empty() {
        config
            .channel_detections
            .iter()
            .map(|c| c.name.clone())
            .collect()
    } else {
        args.channels.clone()
    };
    if channels.is_empty() {
        bail!("no channel to count: pass --channel or a configuration with channelDetections");
    }

    let mut groups = Vec::with_capacity(channels.len());
    for channel in &channels {
        let mut group = DetectionGroup::with_params(
            channel,
            vec![Label::new(channel)],
            ContainerKind::Cells,
            &mut hierarchy,
            &params,
        )
        .with_context(|| format!("cannot load the detections of '{channel}'"))?;
        if let Some(channel_config) = config.channel(channel) {
            classify(&mut hierarchy, &mut group, channel_config)?;
        }
        info!("{group}");
        groups.push(group);
    }

    let mut summaries: Vec<GroupSummary> =
        groups.iter().map(|g| summarize(&hierarchy, g)).collect();

    if let Some(control_id) = config.control_channel() {
        let Some(control) = groups.iter().find(|g| g.id() == control_id) else {
            bail!("control channel '{control_id}' is not being counted");
        };
        let others: Vec<&DetectionGroup> = groups.iter().filter(|g| g.id() != control_id).collect();
        if others.is_empty() {
            warn!(control = control_id, "no channel to check the control against");
        } else {
            let overlaps = DetectionGroup::compute_overlaps(&mut hierarchy, control, &others)
                .with_context(|| format!("cannot compute the overlaps with '{control_id}'"))?;
            info!("{overlaps}");
            summaries.push(summarize(&hierarchy, &overlaps));
        }
    }
    Ok(summaries)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let summaries = run(&args)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut out, &summaries)?;
    } else {
        serde_json::to_writer(&mut out, &summaries)?;
    }
    writeln!(out)?;
    Ok(())
}
