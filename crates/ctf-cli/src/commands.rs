use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use ctf_format::{AccessMode, ArchiveFormat, FileFormat};
use ctf_repo::{EngineConfig, NamespaceAccess, Repository};
use ctf_store::{BlobAccess, FileBlob};
use ctf_synth::{transfer_artifact, ArtifactDigester, Synthesizer};
use ctf_types::media::{
    artifact_set_media_type, MEDIA_TYPE_IMAGE_MANIFEST, MEDIA_TYPE_OCTET_STREAM, SUFFIX_GZIP,
    SUFFIX_ZSTD,
};
use ctf_types::Descriptor;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Command::Formats => cmd_formats(&config),
        Command::Create(args) => cmd_create(&config, args),
        Command::Add(args) => cmd_add(&config, args),
        Command::List(args) => cmd_list(&config, args),
        Command::Describe(args) => cmd_describe(&config, args),
        Command::Synthesize(args) => cmd_synthesize(&config, args),
        Command::Digest(args) => cmd_digest(&config, args),
        Command::Transfer(args) => cmd_transfer(&config, args),
    }
}

fn open(config: &EngineConfig, path: &Path, mode: AccessMode) -> anyhow::Result<Repository> {
    Repository::open(&config.registry(), path, mode, config.access_options())
        .with_context(|| format!("opening repository {}", path.display()))
}

fn print_descriptor(descriptor: &Descriptor) {
    let tags = descriptor.tags();
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" ({})", tags.join(", ").yellow())
    };
    println!(
        "  {}  {}  {}{}",
        descriptor.digest.short_hex().cyan(),
        descriptor.media_type,
        descriptor.size,
        tags
    );
}

fn cmd_formats(config: &EngineConfig) -> anyhow::Result<()> {
    for format in config.registry().supported_formats() {
        let marker = if format == config.default_format {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("{}{}", format.as_str().bold(), marker);
    }
    Ok(())
}

fn cmd_create(config: &EngineConfig, args: CreateArgs) -> anyhow::Result<()> {
    let format = args.format.unwrap_or(config.default_format);
    let repo = Repository::create(&config.registry(), &args.path, format, config.access_options())
        .with_context(|| format!("creating repository {}", args.path.display()))?;
    repo.close()?;
    println!(
        "{} Created {} repository in {}",
        "✓".green().bold(),
        format,
        args.path.display().to_string().bold()
    );
    Ok(())
}

/// Media type declared inside a manifest or index document.
fn declared_media_type(data: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    value.get("mediaType")?.as_str().map(String::from)
}

fn cmd_add(config: &EngineConfig, args: AddArgs) -> anyhow::Result<()> {
    let repo = open(config, &args.repo, AccessMode::CREATE)?;
    let ns = repo.namespace(&args.namespace);
    for path in &args.blobs {
        let digest = ns
            .add_blob(&FileBlob::new(path, MEDIA_TYPE_OCTET_STREAM))
            .with_context(|| format!("adding blob {}", path.display()))?;
        println!("  {} {} {}", "blob".green(), digest.short_hex().cyan(), path.display());
    }

    let data = std::fs::read(&args.artifact)
        .with_context(|| format!("reading {}", args.artifact.display()))?;
    let media_type = args
        .media_type
        .or_else(|| declared_media_type(&data))
        .unwrap_or_else(|| MEDIA_TYPE_IMAGE_MANIFEST.to_string());
    let descriptor = ns.add_artifact(&FileBlob::new(&args.artifact, media_type), &args.tags)?;
    repo.close()?;

    println!("{} Added artifact {}", "✓".green().bold(), descriptor.digest.to_string().yellow());
    Ok(())
}

fn cmd_list(config: &EngineConfig, args: ListArgs) -> anyhow::Result<()> {
    let repo = open(config, &args.repo, AccessMode::READONLY)?;
    let namespaces: Vec<String> = match args.namespace {
        Some(name) => vec![name],
        None => repo.namespaces()?.into_iter().collect(),
    };
    if let Some(main) = repo.main_artifact()? {
        println!("main artifact: {}", main.to_string().yellow());
    }
    for name in namespaces {
        let label = if name.is_empty() { "<root>".to_string() } else { name.clone() };
        println!("{}", label.bold());
        for descriptor in repo.namespace(&name).artifacts()? {
            print_descriptor(&descriptor);
        }
    }
    repo.close()?;
    Ok(())
}

fn cmd_describe(config: &EngineConfig, args: DescribeArgs) -> anyhow::Result<()> {
    let repo = open(config, &args.repo, AccessMode::READONLY)?;
    let artifact = repo.namespace(&args.namespace).get_artifact(&args.reference)?;
    let value: serde_json::Value = serde_json::from_slice(artifact.raw())?;
    println!("{}", format!("{} {}", artifact.media_type(), artifact.digest()).dimmed());
    println!("{}", serde_json::to_string_pretty(&value)?);
    repo.close()?;
    Ok(())
}

fn cmd_synthesize(config: &EngineConfig, args: SynthesizeArgs) -> anyhow::Result<()> {
    let Some(mut format) = ArchiveFormat::for_format(args.format) else {
        bail!("artifact sets are archives; {} is not an archive format", args.format);
    };
    if let Some(level) = config.compression_level {
        format = format.with_level(level);
    }
    let repo = open(config, &args.repo, AccessMode::READONLY)?;
    let blob = Synthesizer::from_config(config)
        .with_format(format)
        .synthesize(&repo.namespace(&args.namespace), &args.reference)?;

    let result = (|| -> anyhow::Result<u64> {
        let mut reader = blob.reader()?;
        let mut out = std::fs::File::create(&args.output)
            .with_context(|| format!("creating {}", args.output.display()))?;
        Ok(std::io::copy(&mut reader, &mut out)?)
    })();
    let media_type = blob.media_type().to_string();
    blob.close()?;
    repo.close()?;
    let size = result?;

    println!(
        "{} Wrote artifact set {}",
        "✓".green().bold(),
        args.output.display().to_string().bold()
    );
    println!("  Media type: {}", media_type.cyan());
    println!("  Size: {size}");
    Ok(())
}

/// Artifact-set media type guessed from the first bytes of a file.
fn sniff_media_type(path: &Path) -> anyhow::Result<String> {
    let mut magic = Vec::with_capacity(4);
    std::fs::File::open(path)?.take(4).read_to_end(&mut magic)?;
    let suffix = match FileFormat::sniff(&magic) {
        FileFormat::Tgz => Some(SUFFIX_GZIP),
        FileFormat::Tzst => Some(SUFFIX_ZSTD),
        _ => None,
    };
    Ok(artifact_set_media_type("", suffix))
}

fn cmd_digest(config: &EngineConfig, args: DigestArgs) -> anyhow::Result<()> {
    let media_type = match args.media_type {
        Some(media_type) => media_type,
        None => sniff_media_type(&args.path)
            .with_context(|| format!("reading {}", args.path.display()))?,
    };
    let blob = FileBlob::new(&args.path, media_type);
    let descriptor = ArtifactDigester::new(config.registry()).determine_digest(&blob)?;
    println!("{}", descriptor.digest);
    tracing::debug!(media_type = %descriptor.media_type, size = descriptor.size, "main artifact");
    Ok(())
}

fn cmd_transfer(config: &EngineConfig, args: TransferArgs) -> anyhow::Result<()> {
    let registry = config.registry();
    let source = open(config, &args.source, AccessMode::READONLY)?;
    let target = open(config, &args.target, AccessMode::CREATE)?;
    let to_namespace = args.to_namespace.unwrap_or_else(|| args.from_namespace.clone());

    let descriptor = transfer_artifact(
        &registry,
        &Synthesizer::from_config(config),
        &source.namespace(&args.from_namespace),
        &args.reference,
        &target.namespace(&to_namespace),
    )?;
    target.close()?;
    source.close()?;

    println!(
        "{} Transferred {} to {}",
        "✓".green().bold(),
        descriptor.digest.to_string().yellow(),
        args.target.display().to_string().bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctf_types::media::MEDIA_TYPE_IMAGE_INDEX;

    #[test]
    fn media_type_from_document() {
        let doc = br#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[]}"#;
        assert_eq!(declared_media_type(doc).as_deref(), Some(MEDIA_TYPE_IMAGE_INDEX));
        assert_eq!(declared_media_type(br#"{"schemaVersion":2}"#), None);
        assert_eq!(declared_media_type(b"not json"), None);
    }

    #[test]
    fn sniffs_gzip_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set");
        std::fs::write(&path, [0x1f, 0x8b, 0x08, 0x00]).unwrap();
        assert_eq!(
            sniff_media_type(&path).unwrap(),
            artifact_set_media_type("", Some(SUFFIX_GZIP))
        );
    }

    #[test]
    fn end_to_end_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default();
        let repo = dir.path().join("repo");
        let config_blob = dir.path().join("config.json");
        let layer = dir.path().join("layer");
        let manifest = dir.path().join("manifest.json");
        std::fs::write(&config_blob, b"{}").unwrap();
        std::fs::write(&layer, b"testdata").unwrap();
        std::fs::write(
            &manifest,
            serde_json::to_vec(&ctf_types::Manifest {
                schema_version: 2,
                media_type: Some(MEDIA_TYPE_IMAGE_MANIFEST.into()),
                config: Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, b"{}"),
                layers: vec![Descriptor::for_content(MEDIA_TYPE_OCTET_STREAM, b"testdata")],
                annotations: Default::default(),
            })
            .unwrap(),
        )
        .unwrap();

        cmd_add(
            &config,
            AddArgs {
                repo: repo.clone(),
                artifact: manifest,
                blobs: vec![config_blob, layer],
                tags: vec!["v1".into()],
                namespace: "team/app".into(),
                media_type: None,
            },
        )
        .unwrap();

        let output = dir.path().join("set.tgz");
        cmd_synthesize(
            &config,
            SynthesizeArgs {
                repo: repo.clone(),
                reference: "v1".into(),
                namespace: "team/app".into(),
                output: output.clone(),
                format: FileFormat::Tgz,
            },
        )
        .unwrap();
        assert!(output.is_file());
        cmd_digest(&config, DigestArgs { path: output, media_type: None }).unwrap();

        cmd_transfer(
            &config,
            TransferArgs {
                source: repo,
                reference: "v1".into(),
                target: dir.path().join("mirror"),
                from_namespace: "team/app".into(),
                to_namespace: None,
            },
        )
        .unwrap();
        let mirror = open(&config, &dir.path().join("mirror"), AccessMode::READONLY).unwrap();
        assert!(mirror.namespace("team/app").tags().unwrap().contains("v1"));
    }

    #[test]
    fn synthesize_rejects_directory_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_synthesize(
            &EngineConfig::default(),
            SynthesizeArgs {
                repo: dir.path().join("repo"),
                reference: "v1".into(),
                namespace: String::new(),
                output: dir.path().join("out"),
                format: FileFormat::Directory,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not an archive format"));
    }
}
