//! # Tree Command Implementation
//!
//! Displays the `parent_class` hierarchy of each class section. Only the
//! declarations are read, so the tree can be shown for a configuration that
//! does not resolve: classes naming a missing parent appear as roots, and
//! classes on a cycle are listed separately.

use std::borrow::Cow;

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};

use blade_provider::classes::{hierarchy, parse_classes, ClassTree, ResourceKind};

use crate::cli::GlobalArgs;

/// Display the class inheritance hierarchy
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Only show one kind of class.
    #[arg(long, value_parser = ["virtual_blades", "blade_interconnects"])]
    pub section: Option<String>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, global: &GlobalArgs) -> Result<()> {
    let document = global.document()?;

    for kind in [ResourceKind::BladeInterconnect, ResourceKind::VirtualBlade] {
        if args.section.as_deref().is_some_and(|s| s != kind.section()) {
            continue;
        }
        let classes = match document.get(kind.section()) {
            Some(section) if !section.is_null() => parse_classes(kind, section)?,
            _ => Default::default(),
        };

        let roots = hierarchy(&classes);
        let shown = count(&roots);
        let root = TreeNode {
            label: kind.section().to_string(),
            children: roots.iter().map(TreeNode::from).collect(),
        };
        print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

        if shown < classes.len() {
            let placed = names(&roots);
            let cyclic: Vec<&str> = classes
                .keys()
                .map(String::as_str)
                .filter(|name| !placed.contains(name))
                .collect();
            println!("  (cyclic: {})", cyclic.join(", "));
        }
    }
    Ok(())
}

fn count(trees: &[ClassTree]) -> usize {
    trees.iter().map(|t| 1 + count(&t.children)).sum()
}

fn names(trees: &[ClassTree]) -> Vec<&str> {
    trees
        .iter()
        .flat_map(|t| std::iter::once(t.name.as_str()).chain(names(&t.children)))
        .collect()
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl From<&ClassTree> for TreeNode {
    fn from(tree: &ClassTree) -> Self {
        let label = if tree.pure_base_class {
            format!("{} (pure base)", tree.name)
        } else {
            tree.name.clone()
        };
        Self {
            label,
            children: tree.children.iter().map(TreeNode::from).collect(),
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
