use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use log::warn;
use serde::Serialize;

use crate::{
    config::{ExportConfig, ImageFormat, MaterialChannel},
    descriptor::{schema, write_json},
    error::Error,
    export::create_dir_tolerant,
    scene::{ChannelInput, Extension, ImageNode, ImageSource, Interpolation, MaterialSource},
};

/// A material descriptor: the resolved texture per enabled channel. Texture
/// image data stays in memory until [`Material::save`] writes the files and
/// fills in the reference paths.
#[derive(Debug, Serialize)]
pub struct Material<'a> {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    path: String,
    textures: Vec<Texture<'a>>,
}

impl<'a> Material<'a> {
    /// Resolves every enabled channel of the material's principled shader
    /// node. A channel linked to an image exports that image; an unlinked
    /// channel with a default value gets a synthesized 1x1 image; a channel
    /// linked to anything else is skipped with a warning, since baking
    /// arbitrary node networks is not implemented.
    pub fn resolve(source: &'a MaterialSource, config: &ExportConfig) -> Result<Self> {
        let principled = source.principled.as_ref().ok_or_else(|| Error::MissingPrincipled {
            material: source.name.clone(),
        })?;

        let mut textures = Vec::new();
        for channel in MaterialChannel::ALL {
            if !config.material_channels.enabled(channel) {
                continue;
            }

            match principled.input(channel) {
                ChannelInput::Image(node) => textures.push(Texture::linked(channel, node)),
                ChannelInput::Value(color) => {
                    textures.push(Texture::constant(&source.name, channel, *color))
                }
                ChannelInput::Node => warn!(
                    "{}",
                    Error::UnsupportedLink {
                        material: source.name.clone(),
                        channel: channel.stem(),
                    }
                ),
                ChannelInput::Unconnected => {}
            }
        }

        Ok(Self {
            schema: schema("material"),
            name: source.name.clone(),
            path: String::new(),
            textures,
        })
    }

    /// Saves every texture under `textures/<material>/`, writes the
    /// descriptor under `materials/`, and returns its reference path.
    pub fn save(&mut self, root: &Path, config: &ExportConfig) -> Result<String> {
        create_dir_tolerant(&root.join("textures").join(&self.name))?;

        for texture in &mut self.textures {
            texture.save(root, &self.name, config)?;
        }

        let descriptor = format!("materials/{}.json", self.name);
        self.path = config.reference(root, &descriptor);
        write_json(&root.join(&descriptor), self)?;

        Ok(self.path.clone())
    }

    #[cfg(test)]
    fn texture(&self, channel: MaterialChannel) -> Option<&Texture<'a>> {
        self.textures.iter().find(|texture| texture.channel == channel)
    }
}

/// One texture reference inside a material descriptor.
#[derive(Debug, Serialize)]
pub struct Texture<'a> {
    #[serde(rename = "$schema")]
    schema: String,
    name: String,
    addressing: &'static str,
    filter: &'static str,
    path: String,
    #[serde(skip)]
    channel: MaterialChannel,
    #[serde(skip)]
    image: TextureImage<'a>,
}

/// Pixel ownership of a texture: synthesized images are owned and dropped
/// with the material, linked images are borrowed from the scene.
#[derive(Debug)]
enum TextureImage<'a> {
    Generated(RgbaImage),
    Linked(&'a ImageSource),
}

impl<'a> Texture<'a> {
    /// Wraps an image texture node, mapping its sampling settings to the
    /// engine's addressing and filter vocabulary.
    fn linked(channel: MaterialChannel, node: &'a ImageNode) -> Self {
        let addressing = match node.extension {
            Extension::Repeat => "repeat",
            Extension::Extend => "clamp edge",
            Extension::Clip => "clamp border",
        };
        let filter = match node.interpolation {
            Interpolation::Linear => "linear",
            Interpolation::Closest => "nearest",
        };

        Self {
            schema: schema("texture"),
            name: node.image.name.clone(),
            addressing,
            filter,
            path: String::new(),
            channel,
            image: TextureImage::Linked(&node.image),
        }
    }

    /// Synthesizes a 1x1 image holding an unlinked input's default value.
    fn constant(material: &str, channel: MaterialChannel, color: [f32; 4]) -> Self {
        let pixel = Rgba(color.map(|component| (component.clamp(0., 1.) * 255.).round() as u8));
        let image = RgbaImage::from_pixel(1, 1, pixel);

        Self {
            schema: schema("texture"),
            name: format!("{} {}", material, channel.stem()),
            addressing: "repeat",
            filter: "linear",
            path: String::new(),
            channel,
            image: TextureImage::Generated(image),
        }
    }

    fn save(&mut self, root: &Path, material: &str, config: &ExportConfig) -> Result<()> {
        let relative = format!(
            "textures/{}/{}.{}",
            material,
            self.channel.stem(),
            config.image_format.extension()
        );
        let full = root.join(&relative);

        let rgba = match &self.image {
            TextureImage::Generated(image) => image.clone(),
            TextureImage::Linked(source) => source.rgba()?,
        };

        // JPEG carries no alpha channel.
        let result = match config.image_format {
            ImageFormat::Jpg => DynamicImage::ImageRgba8(rgba)
                .to_rgb8()
                .save_with_format(&full, config.image_format.codec()),
            _ => rgba.save_with_format(&full, config.image_format.codec()),
        };
        result.with_context(|| format!("failed to save {}", relative))?;

        self.path = config.reference(root, &relative);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::scene::PrincipledNode;

    use super::*;

    #[test]
    fn unlinked_values_synthesize_single_pixel_images() {
        let source = MaterialSource {
            name: String::from("paint"),
            principled: Some(PrincipledNode {
                albedo: ChannelInput::Value([1., 0., 0., 1.]),
                rough: ChannelInput::Value([0.5; 4]),
                ..Default::default()
            }),
        };

        let material = Material::resolve(&source, &ExportConfig::default()).unwrap();

        let albedo = material.texture(MaterialChannel::Albedo).unwrap();
        assert_eq!("paint albedo", albedo.name);
        match &albedo.image {
            TextureImage::Generated(image) => {
                assert_eq!((1, 1), image.dimensions());
                assert_eq!(&Rgba([255, 0, 0, 255]), image.get_pixel(0, 0));
            }
            TextureImage::Linked(_) => panic!("expected a synthesized image"),
        }
    }

    #[test]
    fn unconnected_normal_input_is_omitted() {
        let source = MaterialSource {
            name: String::from("paint"),
            principled: Some(PrincipledNode {
                albedo: ChannelInput::Value([1.; 4]),
                ..Default::default()
            }),
        };

        let material = Material::resolve(&source, &ExportConfig::default()).unwrap();

        assert!(material.texture(MaterialChannel::Normal).is_none());
    }

    #[test]
    fn node_networks_are_skipped_not_fatal() {
        let source = MaterialSource {
            name: String::from("procedural"),
            principled: Some(PrincipledNode {
                albedo: ChannelInput::Node,
                ..Default::default()
            }),
        };

        let material = Material::resolve(&source, &ExportConfig::default()).unwrap();

        assert!(material.texture(MaterialChannel::Albedo).is_none());
    }

    #[test]
    fn missing_principled_node_is_an_error() {
        let source = MaterialSource {
            name: String::from("legacy"),
            principled: None,
        };

        let error = Material::resolve(&source, &ExportConfig::default()).unwrap_err();
        assert_eq!(
            Some(&Error::MissingPrincipled {
                material: String::from("legacy"),
            }),
            error.downcast_ref(),
        );
    }

    #[test]
    fn image_nodes_map_sampling_settings() {
        let node = ImageNode {
            image: ImageSource {
                name: String::from("bricks"),
                width: 1,
                height: 1,
                pixels: vec![0; 4],
            },
            interpolation: Interpolation::Closest,
            extension: Extension::Extend,
        };
        let source = MaterialSource {
            name: String::from("wall"),
            principled: Some(PrincipledNode {
                albedo: ChannelInput::Image(node),
                ..Default::default()
            }),
        };

        let material = Material::resolve(&source, &ExportConfig::default()).unwrap();
        let albedo = material.texture(MaterialChannel::Albedo).unwrap();

        assert_eq!("bricks", albedo.name);
        assert_eq!("clamp edge", albedo.addressing);
        assert_eq!("nearest", albedo.filter);
    }
}
